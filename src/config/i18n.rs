//! Localized operator-facing messages.

/// Operator messages.
#[derive(Debug, Clone)]
pub struct Messages {
    pub thinking: &'static str,
    pub action: &'static str,
    pub observation: &'static str,
    pub step: &'static str,
    pub result: &'static str,
    pub starting_task: &'static str,
    pub task_completed: &'static str,
    pub task_failed: &'static str,
    pub task_cancelled: &'static str,
    pub question: &'static str,
    pub suggestions: &'static str,
    pub answer_prompt: &'static str,
    pub paused: &'static str,
    pub resumed: &'static str,
    pub chat_only_mode: &'static str,
    pub connection_failed: &'static str,
    pub connection_successful: &'static str,
    pub repl_hint: &'static str,
}

/// Chinese messages
pub static MESSAGES_ZH: Messages = Messages {
    thinking: "思考过程",
    action: "执行动作",
    observation: "屏幕描述",
    step: "步骤",
    result: "结果",
    starting_task: "开始执行任务",
    task_completed: "任务完成",
    task_failed: "任务失败",
    task_cancelled: "任务已取消",
    question: "需要您的回答",
    suggestions: "建议选项",
    answer_prompt: "请输入回答（直接回车放弃）",
    paused: "已暂停",
    resumed: "已继续",
    chat_only_mode: "没有可用的设备后端，仅以对话方式回答",
    connection_failed: "连接失败",
    connection_successful: "连接成功",
    repl_hint: "输入任务后回车；运行中可输入 pause / resume / cancel；输入 quit 退出",
};

/// English messages
pub static MESSAGES_EN: Messages = Messages {
    thinking: "Thinking",
    action: "Action",
    observation: "Screen description",
    step: "Step",
    result: "Result",
    starting_task: "Starting task",
    task_completed: "Task Completed",
    task_failed: "Task Failed",
    task_cancelled: "Task Cancelled",
    question: "Your answer is needed",
    suggestions: "Suggestions",
    answer_prompt: "Type an answer (empty line to skip)",
    paused: "Paused",
    resumed: "Resumed",
    chat_only_mode: "No device backend available, answering in chat-only mode",
    connection_failed: "Connection Failed",
    connection_successful: "Connection Successful",
    repl_hint: "Type a task and press Enter; while running type pause / resume / cancel; quit to exit",
};

/// Messages for a language code, "cn" or "en". Unknown codes fall back to Chinese.
pub fn get_messages(lang: &str) -> &'static Messages {
    match lang {
        "en" => &MESSAGES_EN,
        _ => &MESSAGES_ZH,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_messages() {
        assert_eq!(get_messages("cn").thinking, "思考过程");
        assert_eq!(get_messages("en").thinking, "Thinking");
        assert_eq!(get_messages("fr").task_failed, "任务失败");
    }
}
