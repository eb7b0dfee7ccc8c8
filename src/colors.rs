//! Global colors.

use nu_ansi_term::Color;

/// The color used for failures and things the user must not miss.
pub(crate) const ATTENTION_COLOR: Color = Color::Red;

/// The color used for step headers and versions.
pub(crate) const INFO_COLOR: Color = Color::Cyan;

/// The color used to colorise the path.
pub(crate) const PATH_COLOR: Color = Color::LightBlue;

/// The color used for completed steps.
pub(crate) const SUCCESS_COLOR: Color = Color::Green;
