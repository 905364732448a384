//! Gates every generated utterance passes before it is accepted.
//!
//! - `cleanup`: turns raw backend output into a single clean utterance
//! - `quality`: structural checks (role breaks, harmful actions, copied tags)
//! - `repetition`: rejects reruns of recent or own lines

pub mod cleanup;
pub mod quality;
pub mod repetition;

pub use cleanup::{clean_response, strip_any_prefix, strip_other_speech};
pub use quality::{QualityIssue, check_quality};
pub use repetition::{
    RepetitionIssue, RepetitionWindow, check_repetition, is_consecutive_repeat, is_novel,
};
