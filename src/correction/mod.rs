mod detector;
mod excerpt;

pub use detector::{CorrectionVocabulary, Detection};
pub use excerpt::extract_correction_excerpt;
