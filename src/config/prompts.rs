//! System prompts for the decision model.

use chrono::{Datelike, Local};

/// Date header in the prompt language.
fn date_header(lang: &str) -> String {
    let today = Local::now();
    if lang == "en" {
        return format!("Today's date is: {}", today.format("%B %d, %Y"));
    }
    let weekday_names = [
        "星期一",
        "星期二",
        "星期三",
        "星期四",
        "星期五",
        "星期六",
        "星期日",
    ];
    let weekday = weekday_names[today.weekday().num_days_from_monday() as usize];
    format!(
        "今天的日期是: {}年{}月{}日 {}",
        today.format("%Y"),
        today.format("%m"),
        today.format("%d"),
        weekday
    )
}

/// System prompt for the device loop.
///
/// `describe` adds the policy for the on-demand vision tool. `display` is the
/// screen resolution when known.
pub fn device_system_prompt(lang: &str, describe: bool, display: Option<(u32, u32)>) -> String {
    let mut prompt = date_header(lang);
    prompt.push('\n');

    if let Some((w, h)) = display {
        prompt.push_str(&match lang {
            "en" => format!("Current screen resolution: {}x{} (width x height)\n", w, h),
            _ => format!("当前屏幕分辨率: {}x{} (宽x高)\n", w, h),
        });
    }

    prompt.push_str(match lang {
        "en" => SYSTEM_PROMPT_EN,
        _ => SYSTEM_PROMPT_ZH,
    });

    if describe {
        prompt.push_str(match lang {
            "en" => DESCRIBE_POLICY_EN,
            _ => DESCRIBE_POLICY_ZH,
        });
    }
    prompt
}

/// System prompt for a round that must not touch the device.
pub fn chat_system_prompt(lang: &str) -> String {
    format!(
        "{}\n{}",
        date_header(lang),
        match lang {
            "en" => CHAT_PROMPT_EN,
            _ => CHAT_PROMPT_ZH,
        }
    )
}

/// Instruction for the vision pass.
pub fn describe_screen_prompt(lang: &str, focus: Option<&str>) -> String {
    let base = match lang {
        "en" => "Describe this phone screenshot in detail: the app and screen shown, every \
                 visible control with its approximate pixel position, visible text, and any \
                 dialogs or overlays.",
        _ => "请详细描述这张手机截图：当前应用与页面、每个可见控件及其大致像素坐标、\
              可见文字，以及任何弹窗或浮层。",
    };
    match (focus, lang) {
        (Some(focus), "en") => format!("{} Focus on: {}", base, focus),
        (Some(focus), _) => format!("{} 重点关注：{}", base, focus),
        (None, _) => base.to_string(),
    }
}

/// Chinese device-loop prompt (without date header).
pub static SYSTEM_PROMPT_ZH: &str = r#"你是一个手机操作智能体，通过调用工具一步一步完成用户的任务。
每一轮你会收到：任务描述、当前界面的元素列表（以及可能的截图）、之前执行过的步骤。

【坐标系统说明】
所有涉及坐标的工具（tap、long_press、double_tap、swipe）使用**绝对像素坐标**，原点在左上角。
元素列表中每个元素给出了 id、类型、文字和 bounds=[左,上][右,下]。
点击元素时可以直接传 element_id，也可以传元素中心点坐标。

【规则】
1. 每一轮只调用一个工具。
2. 执行操作前先确认当前应用是否为目标应用，否则先调用 open_app。
3. 进入无关页面时先 press_key(back)；页面未加载时可调用 wait，但不要连续多次 wait。
4. 找不到目标内容时可以 scroll 查找；多次尝试无效时换一种方式。
5. 输入文字前确认输入框已聚焦；input_text 会替换输入框原有内容。
6. 任务完成时调用 finished 并给出结果；任务确实无法完成时调用 failed 并说明原因。
7. 需要用户提供信息（如登录、选择、确认付款）时调用 ask_user。
8. 上一步失败时会收到失败原因，请根据原因调整策略，不要重复同样的操作。
"#;

/// English device-loop prompt (without date header).
pub static SYSTEM_PROMPT_EN: &str = r#"You are a phone-operating agent. You complete the user's task one step at a time by calling tools.
Each turn you receive: the task, the current screen's element list (and possibly a screenshot), and the steps executed so far.

[Coordinates]
All coordinate tools (tap, long_press, double_tap, swipe) use **absolute pixel coordinates** with the origin at the top-left.
Each element in the list has an id, a kind, its text and bounds=[left,top][right,bottom].
To tap an element you may pass its element_id or its center coordinates.

[Rules]
1. Call exactly one tool per turn.
2. Before acting, check that the current app is the target app; otherwise call open_app first.
3. On an unrelated page, press_key(back) first. If a page has not loaded, call wait, but do not wait repeatedly.
4. If the target cannot be found, scroll to look for it; after repeated failures, change approach.
5. Make sure an input field is focused before typing; input_text replaces the field's content.
6. When the task is done, call finished with the result. If it truly cannot be done, call failed with the reason.
7. When the user must supply information (login, a choice, payment confirmation), call ask_user.
8. If the previous step failed you will be told why; adapt instead of repeating the same action.
"#;

static DESCRIBE_POLICY_ZH: &str = r#"9. 当元素列表为空或信息不足时，可以调用 describe_screen 获取截图的详细描述。
   describe_screen 不能连续两轮调用；拿到描述后必须先执行其他操作。
"#;

static DESCRIBE_POLICY_EN: &str = r#"9. When the element list is empty or insufficient, call describe_screen for a detailed description of the screenshot.
   describe_screen must never be called on two consecutive turns; after a description, take a different action first.
"#;

static CHAT_PROMPT_ZH: &str = r#"你是一个手机助手。当前请求不需要操作手机，请直接用文字回答用户。
如果确实需要更多信息，可以调用 ask_user；如果无法回答，可以调用 failed。"#;

static CHAT_PROMPT_EN: &str = r#"You are a phone assistant. This request does not require operating the phone; answer the user directly in text.
If you genuinely need more information you may call ask_user; if you cannot answer, call failed."#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_prompt_language() {
        let en = device_system_prompt("en", false, Some((1080, 2400)));
        assert!(en.starts_with("Today's date is"));
        assert!(en.contains("1080x2400"));
        assert!(!en.contains("describe_screen"));

        let zh = device_system_prompt("cn", false, None);
        assert!(zh.starts_with("今天的日期是"));
        assert!(!zh.contains("分辨率"));
    }

    #[test]
    fn test_describe_policy_included_only_when_enabled() {
        let prompt = device_system_prompt("en", true, None);
        assert!(prompt.contains("never be called on two consecutive turns"));
    }

    #[test]
    fn test_describe_prompt_focus() {
        assert!(describe_screen_prompt("en", Some("the banner")).ends_with("Focus on: the banner"));
        assert!(!describe_screen_prompt("cn", None).contains("重点关注"));
    }
}
