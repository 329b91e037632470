//! AsyncAPI 1.x. The 1.x revisions share one document shape, so each step
//! only restamps the version.

use super::bump_to;
use crate::registry::ConvertStep;

pub fn steps() -> Vec<(&'static str, ConvertStep)> {
    vec![
        ("1.0.0", bump_to("1.0.0")),
        ("1.1.0", bump_to("1.1.0")),
        ("1.2.0", bump_to("1.2.0")),
    ]
}
