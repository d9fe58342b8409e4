//! PIN 可接受性校验。
//!
//! 分两层：
//! - [`first_violation`] / [`is_acceptable`]：纯函数，按复杂度策略检查弱模式（连续数字、重复块、键盘序列等）
//! - [`validate_entry`]：调用方层面的校验（长度、纯数字、两次输入一致），随后再调用弱模式检查
//!
//! 安全注意：
//! - 本模块不记录日志、不持久化 PIN；错误信息中不包含 PIN 内容
//! - 日志中如需体现“已输入 PIN”，只能使用固定长度掩码 [`PIN_MASK`]
//!
//! 作者：BitLocker PIN 工具项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::policy::{ComplexityLevel, Policy, MAX_PIN_LENGTH};

/// 日志中代替 PIN 输出的固定掩码（长度与真实 PIN 无关）。
pub const PIN_MASK: &str = "********";

/// 日志输出用：任何 PIN 都替换为 [`PIN_MASK`]。
pub fn mask_pin(_pin: &str) -> &'static str {
    PIN_MASK
}

/// 连续数字串的长度。
const RUN_LENGTH: usize = 5;

/// 用户名片段的长度。
const ACCOUNT_FRAGMENT_LEN: usize = 4;

static ASCENDING_RUN: Lazy<Regex> = Lazy::new(|| run_pattern("01234567890"));
static DESCENDING_RUN: Lazy<Regex> = Lazy::new(|| run_pattern("9876543210"));
static KEYBOARD_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)qwerty|asdfgh|zxcvbn").expect("invalid keyboard pattern"));

/// 由数字序列生成“任意 5 位连续窗口”的正则（例如 `01234|12345|...`）。
fn run_pattern(sequence: &str) -> Regex {
    let digits: Vec<char> = sequence.chars().collect();
    let alternatives: Vec<String> = digits
        .windows(RUN_LENGTH)
        .map(|w| w.iter().collect())
        .collect();
    Regex::new(&alternatives.join("|")).expect("invalid run pattern")
}

/// 弱 PIN 规则（校验失败原因）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PinRule {
    #[error("PIN 不能包含 5 位连续升序数字")]
    AscendingRun,
    #[error("PIN 不能包含 5 位连续降序数字")]
    DescendingRun,
    #[error("同一字符不能连续出现 6 次及以上")]
    LongRepeat,
    #[error("PIN 不能包含紧邻重复的字符块")]
    RepeatedBlock,
    #[error("PIN 不能包含连续重复 3 次及以上的片段")]
    RepeatedSequence,
    #[error("PIN 不能全部由同一字符组成")]
    AllIdentical,
    #[error("PIN 不能包含紧邻重复的两位组合")]
    RepeatedPair,
    #[error("PIN 不能包含键盘连续序列")]
    KeyboardPattern,
    #[error("PIN 不能包含空白或控制字符")]
    Whitespace,
    #[error("PIN 不能包含用户名片段")]
    AccountFragment,
    #[error("PIN 需同时包含大写字母、小写字母、数字和符号")]
    MissingCharacterClass,
}

/// 返回 PIN 违反的第一条弱模式规则；全部通过时返回 `None`。
///
/// 参数：
/// - `pin`：候选 PIN
/// - `policy`：复杂度策略（决定 1/2 与 8~11 号规则是否生效）
/// - `account_name`：当前登录账户名（仅用于用户名片段规则）
///
/// 说明：
/// - 任何输入都不会 panic；空字符串按“全部相同”拒绝
/// - 规则之间相互独立，检查顺序只影响返回的原因，不影响结论
pub fn first_violation(pin: &str, policy: &Policy, account_name: &str) -> Option<PinRule> {
    let chars: Vec<char> = pin.chars().collect();
    if chars.is_empty() {
        return Some(PinRule::AllIdentical);
    }
    let len = chars.len();

    if policy.complexity == ComplexityLevel::Basic {
        if ASCENDING_RUN.is_match(pin) {
            return Some(PinRule::AscendingRun);
        }
        if DESCENDING_RUN.is_match(pin) {
            return Some(PinRule::DescendingRun);
        }
    }

    if has_repeated_block(&chars, 1, 6) {
        return Some(PinRule::LongRepeat);
    }
    if (3..=len / 2).any(|block| has_repeated_block(&chars, block, 2)) {
        return Some(PinRule::RepeatedBlock);
    }
    if (1..=len / 3).any(|block| has_repeated_block(&chars, block, 3)) {
        return Some(PinRule::RepeatedSequence);
    }
    if chars.iter().all(|c| *c == chars[0]) {
        return Some(PinRule::AllIdentical);
    }
    if has_repeated_block(&chars, 2, 2) {
        return Some(PinRule::RepeatedPair);
    }

    if policy.complexity == ComplexityLevel::Enhanced {
        if KEYBOARD_PATTERN.is_match(pin) {
            return Some(PinRule::KeyboardPattern);
        }
        if chars.iter().any(|c| c.is_whitespace() || c.is_control()) {
            return Some(PinRule::Whitespace);
        }
        if contains_account_fragment(pin, account_name) {
            return Some(PinRule::AccountFragment);
        }
        if !covers_character_classes(&chars) {
            return Some(PinRule::MissingCharacterClass);
        }
    }
    None
}

/// PIN 是否通过全部弱模式规则。
pub fn is_acceptable(pin: &str, policy: &Policy, account_name: &str) -> bool {
    first_violation(pin, policy, account_name).is_none()
}

/// 是否存在长度为 `block` 的片段紧邻重复 `reps` 次。
fn has_repeated_block(chars: &[char], block: usize, reps: usize) -> bool {
    let span = block * reps;
    if block == 0 || chars.len() < span {
        return false;
    }
    (0..=chars.len() - span).any(|start| {
        let head = &chars[start..start + block];
        (1..reps).all(|r| &chars[start + r * block..start + (r + 1) * block] == head)
    })
}

/// PIN 是否包含账户名前 4 个字符（忽略大小写）。
///
/// 账户名会先去掉 `DOMAIN\` 前缀与 `@upn` 后缀；不足 4 个字符时不做此项检查。
fn contains_account_fragment(pin: &str, account_name: &str) -> bool {
    let name = account_name.rsplit('\\').next().unwrap_or(account_name);
    let name = name.split('@').next().unwrap_or(name);
    let fragment: String = name.chars().take(ACCOUNT_FRAGMENT_LEN).collect();
    if fragment.chars().count() < ACCOUNT_FRAGMENT_LEN {
        return false;
    }
    pin.to_lowercase().contains(&fragment.to_lowercase())
}

/// 字符类别只按 ASCII 计算（启动前环境只支持 ASCII 键盘输入）。
fn covers_character_classes(chars: &[char]) -> bool {
    let upper = chars.iter().any(|c| c.is_ascii_uppercase());
    let lower = chars.iter().any(|c| c.is_ascii_lowercase());
    let digit = chars.iter().any(|c| c.is_ascii_digit());
    let symbol = chars.iter().any(|c| c.is_ascii_punctuation());
    upper && lower && digit && symbol
}

/// 用户提交的 PIN 被拒绝的原因（用于界面内联提示）。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PinRejection {
    #[error("请输入 PIN")]
    Empty,
    #[error("PIN 长度至少为 {min} 位")]
    TooShort { min: u32 },
    #[error("PIN 长度不能超过 {max} 位")]
    TooLong { max: u32 },
    #[error("PIN 只能包含数字")]
    NonDigit,
    #[error("PIN 只能包含英文字母、数字和英文符号（启动时无法输入其他字符）")]
    NonAscii,
    #[error("两次输入的 PIN 不一致")]
    Mismatch,
    #[error(transparent)]
    Weak(#[from] PinRule),
}

/// 校验一次完整的 PIN 输入（PIN + 确认 PIN）。
///
/// 检查顺序：
/// 1) 非空与长度（最小长度来自策略，最大长度为系统上限）
/// 2) 基础级别下必须为纯数字；任何级别下只允许可打印 ASCII 字符
/// 3) 两次输入一致
/// 4) 弱模式规则（见 [`first_violation`]）
///
/// 返回值：
/// - `Ok(())`：可以提交给保护器安装
/// - `Err(PinRejection)`：拒绝原因（`Display` 可直接展示给用户）
pub fn validate_entry(
    pin: &str,
    confirm: &str,
    policy: &Policy,
    account_name: &str,
) -> Result<(), PinRejection> {
    if pin.is_empty() {
        return Err(PinRejection::Empty);
    }
    let len = pin.chars().count();
    if len < policy.min_length as usize {
        return Err(PinRejection::TooShort { min: policy.min_length });
    }
    if len > MAX_PIN_LENGTH as usize {
        return Err(PinRejection::TooLong { max: MAX_PIN_LENGTH });
    }
    if policy.digits_only() && !pin.chars().all(|c| c.is_ascii_digit()) {
        return Err(PinRejection::NonDigit);
    }
    if !pin.chars().all(|c| c.is_ascii_graphic()) {
        return Err(PinRejection::NonAscii);
    }
    if pin != confirm {
        return Err(PinRejection::Mismatch);
    }
    match first_violation(pin, policy, account_name) {
        Some(rule) => Err(rule.into()),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basic() -> Policy {
        Policy::default()
    }

    fn enhanced() -> Policy {
        Policy {
            min_length: 8,
            complexity: ComplexityLevel::Enhanced,
        }
    }

    #[test]
    fn single_repeated_digit_is_rejected_under_any_policy() {
        for d in '0'..='9' {
            for n in 1..=12 {
                let pin: String = std::iter::repeat(d).take(n).collect();
                assert!(!is_acceptable(&pin, &basic(), "jdoe"), "{pin}");
                assert!(!is_acceptable(&pin, &enhanced(), "jdoe"), "{pin}");
            }
        }
    }

    #[test]
    fn five_digit_runs_are_rejected_under_basic() {
        let ascending = "01234567890";
        let descending = "9876543210";
        for seq in [ascending, descending] {
            let digits: Vec<char> = seq.chars().collect();
            for w in digits.windows(5) {
                let run: String = w.iter().collect();
                let pin = format!("4{run}9");
                assert!(!is_acceptable(&pin, &basic(), ""), "{pin}");
            }
        }
        assert_eq!(first_violation("40987651", &basic(), ""), Some(PinRule::DescendingRun));
        assert_eq!(first_violation("93456782", &basic(), ""), Some(PinRule::AscendingRun));
    }

    #[test]
    fn well_formed_digit_pin_is_accepted() {
        assert!(is_acceptable("13579246", &basic(), "jdoe"));
        assert_eq!(validate_entry("13579246", "13579246", &basic(), "jdoe"), Ok(()));
    }

    #[test]
    fn alternating_pair_is_rejected() {
        assert!(!is_acceptable("12121212", &basic(), ""));
        assert!(!is_acceptable("12121212", &enhanced(), ""));
        assert_eq!(first_violation("91212", &basic(), ""), Some(PinRule::RepeatedPair));
    }

    #[test]
    fn repetition_rules_do_not_depend_on_complexity() {
        assert_eq!(first_violation("1222222", &basic(), ""), Some(PinRule::LongRepeat));
        assert_eq!(first_violation("Ab!Ab!x9", &enhanced(), ""), Some(PinRule::RepeatedBlock));
        assert_eq!(first_violation("Ab!Ab!x9", &basic(), ""), Some(PinRule::RepeatedBlock));
        assert_eq!(first_violation("8111", &basic(), ""), Some(PinRule::RepeatedSequence));
        assert_eq!(first_violation("8111", &enhanced(), ""), Some(PinRule::RepeatedSequence));
    }

    #[test]
    fn enhanced_pin_with_all_classes_passes_coverage() {
        assert!(covers_character_classes(&"Ab3!5678".chars().collect::<Vec<_>>()));
        assert!(is_acceptable("Ab3!5678", &enhanced(), "jdoe"));
    }

    #[test]
    fn gated_rules_follow_complexity_level() {
        // 连续数字只在基础级别检查
        assert_eq!(first_violation("Ab!12345", &basic(), ""), Some(PinRule::AscendingRun));
        assert!(is_acceptable("Ab!12345", &enhanced(), ""));

        // 键盘序列、空白、用户名、字符种类只在增强级别检查
        assert!(is_acceptable("Zqwerty7!", &basic(), ""));
        assert_eq!(first_violation("Zqwerty7!", &enhanced(), ""), Some(PinRule::KeyboardPattern));
        assert_eq!(first_violation("Ab3! 9xY", &enhanced(), ""), Some(PinRule::Whitespace));
        assert_eq!(
            first_violation("xJDOE7!a", &enhanced(), "CONTOSO\\jdoe.admin"),
            Some(PinRule::AccountFragment)
        );
        assert!(is_acceptable("xJDOE7!a", &basic(), "CONTOSO\\jdoe.admin"));
        assert_eq!(
            first_violation("abcd7!xy", &enhanced(), ""),
            Some(PinRule::MissingCharacterClass)
        );
    }

    #[test]
    fn short_account_names_are_not_used_as_fragments() {
        assert!(!contains_account_fragment("Ab3!5678", "ab"));
        assert!(contains_account_fragment("xx-JDOE", "jdoe@contoso.com"));
    }

    #[test]
    fn empty_and_odd_input_never_panics() {
        assert_eq!(first_violation("", &basic(), ""), Some(PinRule::AllIdentical));
        assert!(!is_acceptable("", &enhanced(), "jdoe"));
        let _ = is_acceptable("ß→€\u{0}é", &enhanced(), "ü");
        let _ = is_acceptable("\u{200b}", &basic(), "");
    }

    #[test]
    fn entry_validation_order() {
        let p = basic();
        assert_eq!(validate_entry("", "", &p, ""), Err(PinRejection::Empty));
        assert_eq!(validate_entry("1357", "1357", &p, ""), Err(PinRejection::TooShort { min: 8 }));
        assert_eq!(
            validate_entry("135792468013579246801", "135792468013579246801", &p, ""),
            Err(PinRejection::TooLong { max: 20 })
        );
        assert_eq!(validate_entry("1357924a", "1357924a", &p, ""), Err(PinRejection::NonDigit));
        assert_eq!(validate_entry("13579246", "13579247", &p, ""), Err(PinRejection::Mismatch));
        assert_eq!(
            validate_entry("13451212", "13451212", &p, ""),
            Err(PinRejection::Weak(PinRule::RepeatedPair))
        );
        assert_eq!(validate_entry("Ab3!5678", "Ab3!5678", &enhanced(), "jdoe"), Ok(()));
    }

    #[test]
    fn enhanced_entry_is_limited_to_printable_ascii() {
        let p = enhanced();
        assert_eq!(validate_entry("Ab3€5678", "Ab3€5678", &p, ""), Err(PinRejection::NonAscii));
        assert_eq!(validate_entry("Ab3!中文xy", "Ab3!中文xy", &p, ""), Err(PinRejection::NonAscii));
        assert_eq!(validate_entry("Ａb3!5678", "Ａb3!5678", &p, ""), Err(PinRejection::NonAscii));
        assert_eq!(validate_entry("Ab3! 678", "Ab3! 678", &p, ""), Err(PinRejection::NonAscii));
        assert_eq!(validate_entry("Ab3~5678", "Ab3~5678", &p, ""), Ok(()));

        // 非 ASCII 字母不计入大小写类别
        assert!(!covers_character_classes(&"ÄbÉ3!xyz".chars().collect::<Vec<_>>()));
        assert!(!covers_character_classes(&"Ab3€5678".chars().collect::<Vec<_>>()));
    }

    #[test]
    fn rejection_messages_never_echo_the_pin() {
        let err = validate_entry("13579246", "97531864", &basic(), "").unwrap_err();
        assert!(!err.to_string().contains("13579246"));
        assert_eq!(mask_pin("13579246"), PIN_MASK);
        assert_eq!(mask_pin("1234567890123"), PIN_MASK);
    }
}
