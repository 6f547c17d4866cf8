//! Static configuration: app resolution, prompts, and operator messages.

mod apps;
mod i18n;
mod prompts;

pub use apps::{is_package_name, AppResolver, StaticAppResolver};
pub use i18n::{get_messages, Messages};
pub use prompts::{
    chat_system_prompt, describe_screen_prompt, device_system_prompt, SYSTEM_PROMPT_EN,
    SYSTEM_PROMPT_ZH,
};
