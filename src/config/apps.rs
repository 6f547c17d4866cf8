//! App name to package name resolution.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

/// Known apps: display name and Android package.
///
/// Lookups are case- and whitespace-insensitive, so only one spelling per
/// name is listed.
const KNOWN_APPS: &[(&str, &str)] = &[
    // Social & Messaging
    ("微信", "com.tencent.mm"),
    ("WeChat", "com.tencent.mm"),
    ("QQ", "com.tencent.mobileqq"),
    ("微博", "com.sina.weibo"),
    ("WhatsApp", "com.whatsapp"),
    ("Telegram", "org.telegram.messenger"),
    // E-commerce
    ("淘宝", "com.taobao.taobao"),
    ("京东", "com.jingdong.app.mall"),
    ("拼多多", "com.xunmeng.pinduoduo"),
    // Lifestyle
    ("小红书", "com.xingin.xhs"),
    ("知乎", "com.zhihu.android"),
    ("美团", "com.sankuai.meituan"),
    ("大众点评", "com.dianping.v1"),
    ("饿了么", "me.ele"),
    // Maps & Travel
    ("高德地图", "com.autonavi.minimap"),
    ("百度地图", "com.baidu.BaiduMap"),
    ("携程", "ctrip.android.view"),
    ("12306", "com.MobileTicket"),
    ("铁路12306", "com.MobileTicket"),
    ("滴滴出行", "com.sdu.did.psnger"),
    ("Booking.com", "com.booking"),
    ("Booking", "com.booking"),
    ("Expedia", "com.expedia.bookings"),
    // Video & Music
    ("bilibili", "tv.danmaku.bili"),
    ("抖音", "com.ss.android.ugc.aweme"),
    ("快手", "com.smile.gifmaker"),
    ("网易云音乐", "com.netease.cloudmusic"),
    ("QQ音乐", "com.tencent.qqmusic"),
    ("YouTube", "com.google.android.youtube"),
    // Productivity
    ("飞书", "com.ss.android.lark"),
    ("Gmail", "com.google.android.gm"),
    ("Chrome", "com.android.chrome"),
    ("Google Chrome", "com.android.chrome"),
    ("Google Maps", "com.google.android.apps.maps"),
    ("Maps", "com.google.android.apps.maps"),
    ("Duolingo", "com.duolingo"),
    // System
    ("Settings", "com.android.settings"),
    ("设置", "com.android.settings"),
    ("Android System Settings", "com.android.settings"),
    ("Camera", "com.android.camera"),
    ("相机", "com.android.camera"),
    ("Gallery", "com.android.gallery3d"),
    ("Calculator", "com.android.calculator2"),
    ("计算器", "com.android.calculator2"),
    ("Calendar", "com.android.calendar"),
    ("Clock", "com.android.deskclock"),
    ("Contacts", "com.android.contacts"),
    ("Messages", "com.android.mms"),
    ("短信", "com.android.mms"),
    ("Phone", "com.android.dialer"),
    ("电话", "com.android.dialer"),
    ("Files", "com.android.fileexplorer"),
    ("File Manager", "com.android.fileexplorer"),
    ("Audio Recorder", "com.android.soundrecorder"),
];

static APP_PACKAGES: Lazy<HashMap<String, &'static str>> = Lazy::new(|| {
    KNOWN_APPS
        .iter()
        .map(|(name, package)| (normalize(name), *package))
        .collect()
});

static PACKAGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9_]*(\.[A-Za-z0-9_]+)+$").expect("package regex is valid")
});

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Whether `value` is shaped like an Android package name.
pub fn is_package_name(value: &str) -> bool {
    PACKAGE_RE.is_match(value.trim())
}

/// Maps a human app name to a launchable identifier.
pub trait AppResolver: Send + Sync {
    fn resolve(&self, name: &str) -> Option<String>;

    /// Display names this resolver knows, used for task classification.
    fn known_names(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Resolver backed by the built-in table plus user-supplied entries.
#[derive(Debug, Clone, Default)]
pub struct StaticAppResolver {
    extra: HashMap<String, String>,
    extra_names: Vec<String>,
}

impl StaticAppResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or override a mapping. Names that normalize to nothing are ignored.
    pub fn with_app(mut self, name: impl Into<String>, package: impl Into<String>) -> Self {
        let name = name.into();
        let key = normalize(&name);
        if key.is_empty() {
            return self;
        }
        self.extra.insert(key, package.into());
        self.extra_names.push(name);
        self
    }

    pub fn with_apps<I, K, V>(self, apps: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        apps.into_iter()
            .fold(self, |resolver, (name, package)| resolver.with_app(name, package))
    }
}

impl AppResolver for StaticAppResolver {
    fn resolve(&self, name: &str) -> Option<String> {
        let key = normalize(name);
        if key.is_empty() {
            return None;
        }
        if let Some(package) = self.extra.get(&key) {
            return Some(package.clone());
        }
        if let Some(package) = APP_PACKAGES.get(&key) {
            return Some((*package).to_string());
        }
        is_package_name(name).then(|| name.trim().to_string())
    }

    fn known_names(&self) -> Vec<String> {
        KNOWN_APPS
            .iter()
            .map(|(name, _)| (*name).to_string())
            .chain(self.extra_names.iter().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_known_names() {
        let resolver = StaticAppResolver::new();
        assert_eq!(resolver.resolve("微信").as_deref(), Some("com.tencent.mm"));
        assert_eq!(resolver.resolve("chrome").as_deref(), Some("com.android.chrome"));
        assert_eq!(
            resolver.resolve("Android-System-Settings").as_deref(),
            Some("com.android.settings")
        );
        assert_eq!(resolver.resolve("booking.com").as_deref(), Some("com.booking"));
        assert_eq!(resolver.resolve("NonExistent"), None);
        assert_eq!(resolver.resolve("  "), None);
    }

    #[test]
    fn test_package_names_pass_through() {
        let resolver = StaticAppResolver::new();
        assert_eq!(
            resolver.resolve("org.example.notes").as_deref(),
            Some("org.example.notes")
        );
        assert!(!is_package_name("not a package"));
    }

    #[test]
    fn test_extra_entries_override() {
        let resolver = StaticAppResolver::new()
            .with_apps([("Chrome", "org.chromium.chrome"), ("Notes", "com.example.notes")]);
        assert_eq!(resolver.resolve("CHROME").as_deref(), Some("org.chromium.chrome"));
        assert_eq!(resolver.resolve("notes").as_deref(), Some("com.example.notes"));
        assert!(resolver.known_names().contains(&"Notes".to_string()));
    }

    #[test]
    fn test_blank_names_ignored() {
        let resolver = StaticAppResolver::new().with_apps([("", "com.x"), (" - ", "com.y")]);
        assert_eq!(
            resolver.known_names().len(),
            StaticAppResolver::new().known_names().len()
        );
    }
}
