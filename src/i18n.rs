// ==========================================
// 国际化 (i18n) 模块
// ==========================================
// 使用 rust-i18n 库
// 支持中文（默认）和英文
// ==========================================
// 注意: rust_i18n::i18n! 宏已在 lib.rs 中初始化
// ==========================================

use crate::domain::readiness::Readiness;
use crate::domain::types::BlockedReason;

/// 获取当前语言
pub fn current_locale() -> String {
    rust_i18n::locale().to_string()
}

/// 设置语言
///
/// # 参数
/// - locale: 语言代码（"zh-CN" 或 "en"）
pub fn set_locale(locale: &str) {
    rust_i18n::set_locale(locale);
}

/// 翻译消息（无参数）
pub fn t(key: &str) -> String {
    rust_i18n::t!(key).to_string()
}

/// 翻译消息（带参数）
///
/// # 示例
/// ```no_run
/// use mes_readiness::i18n::t_with_args;
/// let msg = t_with_args("readiness.wait_minutes", &[("minutes", "25")]);
/// ```
pub fn t_with_args(key: &str, args: &[(&str, &str)]) -> String {
    let mut result = rust_i18n::t!(key).to_string();
    for (k, v) in args {
        let placeholder = format!("%{{{}}}", k);
        result = result.replace(&placeholder, v);
    }
    result
}

/// 阻塞原因的本地化标签
pub fn blocked_reason_label(reason: BlockedReason) -> String {
    t(&reason.i18n_key())
}

/// 就绪结论的本地化描述（用于看板提示）
pub fn describe_readiness(readiness: &Readiness) -> String {
    if readiness.is_ready {
        return t("readiness.ready");
    }
    let labels: Vec<String> = readiness
        .blocked_reasons
        .iter()
        .copied()
        .map(blocked_reason_label)
        .collect();
    let mut text = format!("{}: {}", t("readiness.blocked"), labels.join(", "));
    if let Some(minutes) = readiness.estimated_wait_time {
        text.push_str(" · ");
        text.push_str(&t_with_args(
            "readiness.wait_minutes",
            &[("minutes", &minutes.to_string())],
        ));
    }
    text
}
