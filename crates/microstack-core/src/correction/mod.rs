//! Background and contrast correction.
//!
//! Every mapping between value ranges goes through [`rescale`], which is also
//! the primitive behind bit-depth normalization on export.

pub mod background;
pub mod contrast;
pub mod reference;
pub mod rescale;

pub use background::{background_correction, AverageMethod, BackgroundParams, CorrectionMethod};
pub use contrast::{do_contrast_correction, set_contrast_correction, ContrastMapping, ContrastParams};
pub use rescale::{rescale, Limits};
