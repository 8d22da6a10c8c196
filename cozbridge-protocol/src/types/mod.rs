pub mod args;
pub mod call;
pub mod light;
pub mod state;

pub use args::*;
pub use call::*;
pub use light::*;
pub use state::*;
