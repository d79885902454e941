// HTTP routes
pub mod content;
pub mod engagements;
pub mod health;

pub use content::*;
pub use engagements::*;
pub use health::*;
