pub mod pattern;
pub mod requirement;
pub mod shift;
pub mod staff;
pub mod time;

pub use pattern::*;
pub use requirement::*;
pub use shift::*;
pub use staff::*;
