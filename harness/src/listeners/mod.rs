pub mod psychometric;
pub mod scripted;

pub use psychometric::PsychometricListener;
pub use scripted::{ScriptStep, ScriptedListener};
