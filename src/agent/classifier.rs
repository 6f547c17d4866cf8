//! Classifies user input as simple chat or device work, and extracts a target app.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::AppResolver;

/// Phrases that imply operating the device.
const DEVICE_CUES_EN: &[&str] = &[
    "open", "launch", "start", "tap", "click", "press", "swipe", "scroll", "type", "send",
    "search", "install", "uninstall", "call", "text ", "message", "turn on", "turn off",
    "enable", "disable", "set ", "play", "pause", "book", "order", "buy", "download",
    "navigate", "take a photo", "screenshot", "close", "go to", "log in", "sign in",
    "subscribe", "reply", "post", "share", "delete", "find ", "check my",
];

const DEVICE_CUES_ZH: &[&str] = &[
    "打开", "启动", "点击", "点一下", "滑动", "输入", "发送", "发给", "搜索", "安装", "卸载",
    "拨打", "打电话", "发消息", "开启", "关闭", "设置", "播放", "暂停", "预订", "下单", "购买",
    "下载", "导航", "拍照", "截图", "进入", "登录", "回复", "分享", "删除", "查看我的", "帮我",
];

static CHAT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?ix)
        ^\s*(hi|hello|hey|thanks|thank\s+you|good\s+(morning|evening|night))\b
        | ^\s*(what|why|how|who|when|where|which|is|are|can\s+you\s+explain|explain|tell\s+me|translate|define)\b
        | [?？]\s*$
        | ^\s*(你好|您好|谢谢|早上好|晚上好)
        | (什么是|为什么|怎么样|是什么|是谁|解释|翻译|讲个|吗\s*$)",
    )
    .expect("chat regex is valid")
});

static LAUNCH_CUE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:\b(?:open|launch|start|in|on|use|using|with|from)\s+(?:the\s+)?$|(?:打开|启动|进入|用|在|去|上)$)")
        .expect("launch cue regex is valid")
});

/// Result of classifying one input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// No device action is needed.
    pub simple_chat: bool,
    /// App named in the input, as written.
    pub target_app: Option<String>,
}

/// Keyword classifier backed by the app resolver's known names.
#[derive(Clone)]
pub struct TaskClassifier {
    apps: Arc<dyn AppResolver>,
}

impl TaskClassifier {
    pub fn new(apps: Arc<dyn AppResolver>) -> Self {
        Self { apps }
    }

    pub fn classify(&self, input: &str) -> Classification {
        let target_app = self.extract_app(input);
        if target_app.is_some() {
            return Classification {
                simple_chat: false,
                target_app,
            };
        }

        let lower = input.to_lowercase();
        let device = DEVICE_CUES_EN.iter().any(|cue| contains_word(&lower, cue))
            || DEVICE_CUES_ZH.iter().any(|cue| input.contains(cue));
        let chat = CHAT_RE.is_match(input);

        Classification {
            simple_chat: chat && !device,
            target_app: None,
        }
    }

    /// First known app name that directly follows a launch cue ("open X",
    /// "打开X", "in X"). Longer names win over their prefixes.
    fn extract_app(&self, input: &str) -> Option<String> {
        let lower = input.to_lowercase();
        let mut names = self.apps.known_names();
        names.sort_by_key(|n| std::cmp::Reverse(n.chars().count()));

        let mut best: Option<(usize, String)> = None;
        for name in names {
            let needle = name.trim().to_lowercase();
            if needle.is_empty() {
                continue;
            }
            let mut from = 0;
            while let Some(pos) = lower[from..].find(&needle).map(|p| p + from) {
                let end = pos + needle.len();
                let bounded_after = lower[end..]
                    .chars()
                    .next()
                    .map(|c| !c.is_ascii_alphanumeric() || !needle.is_ascii())
                    .unwrap_or(true);
                if bounded_after && LAUNCH_CUE_RE.is_match(&lower[..pos]) {
                    if best.as_ref().map(|(p, _)| pos < *p).unwrap_or(true) {
                        best = Some((pos, name.clone()));
                    }
                    break;
                }
                from = end;
            }
        }
        best.map(|(_, name)| name)
    }
}

/// Substring match that respects ASCII word starts.
fn contains_word(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(pos, _)| {
        haystack[..pos]
            .chars()
            .next_back()
            .map(|c| !c.is_ascii_alphanumeric())
            .unwrap_or(true)
    })
}
