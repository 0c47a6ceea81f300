pub mod binding;
pub mod keymap;

pub use binding::{BUTTON_SLOTS, ButtonBindingTable, resolve};
pub use keymap::{KeyMacro, KeyMacroError};
