//! Fixed user-facing texts.
//!
//! Error replies never include error detail; see [`for_error`].

use crate::error::AppError;

pub const WELCOME: &str = "👋 Welcome to LabelCheck! Send me a list of ingredients (for example: \
sugar, salt, INS 211) or a photo of a food label, and I'll tag each ingredient ✅ Safe, \
⚠️ Caution or ❌ Avoid.";

pub const GENERIC_APOLOGY: &str = "Sorry, something went wrong. Please try again in a moment.";

pub const BACKEND_APOLOGY: &str =
    "Sorry, I couldn't analyse those ingredients right now. Please try again in a moment.";

pub const MEDIA_APOLOGY: &str = "Sorry, I couldn't process that image. Please send a clear photo \
of the ingredient list, or type the ingredients instead.";

pub const NOTHING_TO_EXPAND: &str = "There's nothing to expand on yet. Send me an ingredient list \
or a photo of the label first.";

pub const STILL_PREPARING: &str =
    "Your detailed analysis is still being prepared. Please ask again in a few seconds.";

pub const EMPTY_MESSAGE: &str =
    "Send me an ingredient list (for example: sugar, salt, INS 211) or a photo of the label.";

pub const GREETING_HINT: &str =
    "Hi again! Send me an ingredient list or a photo of a label and I'll check it for you.";

pub const RATE_LIMITED: &str = "You're sending messages faster than I can analyse them. \
Please wait a minute and try again.";

/// Appended to every short summary.
pub fn detail_trailer(keyword: &str) -> String {
    format!("Reply *{}* for a full explanation of each ingredient.", keyword)
}

/// Maps a failure to the reply the sender sees.
pub fn for_error(error: &AppError) -> &'static str {
    match error {
        e if e.is_media_failure() => MEDIA_APOLOGY,
        AppError::Backend(_) | AppError::EmptyResponse | AppError::Timeout(_) | AppError::Actor(_) => {
            BACKEND_APOLOGY
        }
        AppError::RateLimited => RATE_LIMITED,
        _ => GENERIC_APOLOGY,
    }
}
