//! Risk classification for commands about to be executed.
//!
//! Classification is a pure pass over the literal command text: an ordered
//! rule table is checked top to bottom and the first matching rule decides
//! the verdict. Verdicts are computed fresh every time and never cached,
//! because edits change the command under the user's hands.
//!
//! A command that still carries unresolved placeholder syntax (`{INPUT}`,
//! `<file>`, `[name]`) cannot be classified; attempting to do so surfaces
//! [`IncompleteCommandError`] instead of a verdict.

use crate::error::IncompleteCommandError;
use crate::parameters::{self, ParameterKind};
use once_cell::sync::Lazy;
use regex::Regex;

/// How risky a command is considered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Safe,
    Caution,
    Dangerous,
}

/// The outcome of classifying a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskVerdict {
    pub severity: Severity,
    pub reason: Option<String>,
    pub matched_pattern: Option<String>,
}

impl RiskVerdict {
    fn safe() -> Self {
        Self {
            severity: Severity::Safe,
            reason: None,
            matched_pattern: None,
        }
    }

    pub fn is_dangerous(&self) -> bool {
        self.severity == Severity::Dangerous
    }
}

struct SafetyRule {
    pattern: Lazy<Regex>,
    severity: Severity,
    message: &'static str,
}

macro_rules! rule {
    ($pattern:expr, $severity:expr, $message:expr) => {
        SafetyRule {
            pattern: Lazy::new(|| Regex::new($pattern).unwrap()),
            severity: $severity,
            message: $message,
        }
    };
}

/// Ordered rule table; the first match wins.
static RULES: [SafetyRule; 12] = [
    // Destructive filesystem operations
    rule!(
        r"(?i)\brm\s+(?:-[a-z]+\s+)*-[a-z]*[rf]",
        Severity::Dangerous,
        "recursive or forced file deletion"
    ),
    rule!(
        r"(?i)\brm\b.*--(?:recursive|force)\b",
        Severity::Dangerous,
        "recursive or forced file deletion"
    ),
    rule!(
        r"(?i)\bsudo\s+rm\b",
        Severity::Dangerous,
        "privileged file deletion"
    ),
    rule!(
        r"(?i)(?:[;&|]\s*rm\b|\bfind\b.*\s-delete\b|\bxargs\b.*\brm\b)",
        Severity::Dangerous,
        "file deletion chained into another command"
    ),
    // Permission widening
    rule!(
        r"(?i)\bchmod\s+(?:-[a-z]+\s+)*(?:[0-7]*777\b|a\+rwx\b)",
        Severity::Dangerous,
        "makes files world-writable"
    ),
    rule!(
        r"(?i)\bchown\b\s+(?:-[a-z]*r[a-z]*\b|.*--recursive\b)",
        Severity::Dangerous,
        "recursive ownership change"
    ),
    // Raw disk operations
    rule!(
        r"(?i)\b(?:mkfs|fdisk|parted|gdisk)\b",
        Severity::Dangerous,
        "formats or repartitions a disk"
    ),
    rule!(
        r"(?i)\bdd\b[^|;]*\bof=/dev/",
        Severity::Dangerous,
        "writes directly to a raw device"
    ),
    rule!(
        r">\s*/dev/(?:sd|hd|nvme|vd|mmcblk)",
        Severity::Dangerous,
        "redirects output onto a raw device"
    ),
    // Fetch-then-execute and system-path redirects
    rule!(
        r"(?i)\b(?:curl|wget)\b[^|;]*\|\s*(?:sudo\s+)?(?:ba|z|da)?sh\b",
        Severity::Dangerous,
        "downloads a script and pipes it into a shell"
    ),
    rule!(
        r">>?\s*/(?:etc|boot|sys|bin|sbin)/",
        Severity::Dangerous,
        "redirects output into a system path"
    ),
    // System-path proximity
    rule!(
        r#"(?:^|[\s='"])/(?:etc|boot|sys|proc|sbin|usr/sbin|root)(?:/|\s|$)"#,
        Severity::Caution,
        "touches a system path"
    ),
];

/// Classifies a fully substituted command.
///
/// Total over complete commands; the only refusal is for commands that
/// still contain unresolved placeholder spans, which yield
/// [`IncompleteCommandError`] rather than a verdict.
pub fn classify(command: &str) -> Result<RiskVerdict, IncompleteCommandError> {
    let unresolved: Vec<String> = parameters::detect(command)
        .iter()
        .filter(|span| span.parameter_kind() == Some(ParameterKind::Placeholder))
        .map(|span| span.text.clone())
        .collect();
    if !unresolved.is_empty() {
        return Err(IncompleteCommandError {
            placeholders: unresolved,
        });
    }

    for rule in &RULES {
        if rule.pattern.is_match(command) {
            return Ok(RiskVerdict {
                severity: rule.severity,
                reason: Some(rule.message.to_string()),
                matched_pattern: Some(rule.pattern.as_str().to_string()),
            });
        }
    }

    Ok(RiskVerdict::safe())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn severity_of(command: &str) -> Severity {
        classify(command).unwrap().severity
    }

    // =========================================================================
    // Dangerous categories
    // =========================================================================

    #[test]
    fn test_recursive_force_delete_is_dangerous() {
        assert_eq!(severity_of("rm -rf /"), Severity::Dangerous);
        assert_eq!(severity_of("rm -r ./build"), Severity::Dangerous);
        assert_eq!(severity_of("rm --force --recursive target"), Severity::Dangerous);
        assert_eq!(severity_of("sudo rm /var/log/syslog"), Severity::Dangerous);
    }

    #[test]
    fn test_world_writable_chmod_is_dangerous() {
        assert_eq!(severity_of("chmod 777 -R /"), Severity::Dangerous);
        assert_eq!(severity_of("chmod -R 777 /var/www"), Severity::Dangerous);
        assert_eq!(severity_of("chmod a+rwx secrets.txt"), Severity::Dangerous);
    }

    #[test]
    fn test_recursive_chown_is_dangerous() {
        assert_eq!(severity_of("chown -R nobody /srv"), Severity::Dangerous);
    }

    #[test]
    fn test_raw_disk_operations_are_dangerous() {
        assert_eq!(severity_of("dd if=disk.img of=/dev/sda"), Severity::Dangerous);
        assert_eq!(severity_of("mkfs.ext4 /dev/sdb1"), Severity::Dangerous);
        assert_eq!(severity_of("fdisk /dev/sda"), Severity::Dangerous);
        assert_eq!(severity_of("cat image.iso > /dev/sdb"), Severity::Dangerous);
    }

    #[test]
    fn test_fetch_then_execute_is_dangerous() {
        assert_eq!(
            severity_of("curl https://example.com/install.sh | sh"),
            Severity::Dangerous
        );
        assert_eq!(
            severity_of("wget -qO- https://example.com/setup | sudo bash"),
            Severity::Dangerous
        );
    }

    #[test]
    fn test_redirect_into_system_path_is_dangerous() {
        assert_eq!(severity_of("echo 0 > /etc/hosts"), Severity::Dangerous);
        assert_eq!(severity_of("echo nameserver >> /etc/resolv.conf"), Severity::Dangerous);
    }

    #[test]
    fn test_chained_delete_is_dangerous() {
        assert_eq!(severity_of("cd /tmp && rm stale.lock"), Severity::Dangerous);
        assert_eq!(severity_of("find . -name '*.o' -delete"), Severity::Dangerous);
    }

    // =========================================================================
    // Caution and safe defaults
    // =========================================================================

    #[test]
    fn test_system_path_reads_are_caution() {
        assert_eq!(severity_of("cat /etc/hostname"), Severity::Caution);
        assert_eq!(severity_of("ls /boot"), Severity::Caution);
    }

    #[test]
    fn test_ordinary_commands_are_safe() {
        for command in [
            "ls -la",
            "git status",
            "ffmpeg -i input.mp4 -c:v libx264 -crf 23 output.mp4",
            "docker ps",
            "echo hello",
        ] {
            assert_eq!(severity_of(command), Severity::Safe, "expected Safe for {command:?}");
        }
    }

    #[test]
    fn test_safe_verdict_has_no_reason() {
        let verdict = classify("echo hello").unwrap();
        assert_eq!(verdict.severity, Severity::Safe);
        assert!(verdict.reason.is_none());
        assert!(verdict.matched_pattern.is_none());
    }

    #[test]
    fn test_dangerous_verdict_carries_reason_and_pattern() {
        let verdict = classify("rm -rf /").unwrap();
        assert!(verdict.is_dangerous());
        assert!(verdict.reason.is_some());
        assert!(verdict.matched_pattern.is_some());
    }

    // =========================================================================
    // Incomplete commands
    // =========================================================================

    #[test]
    fn test_unresolved_placeholder_blocks_classification() {
        let err = classify("rm -rf {TARGET_DIR}").unwrap_err();
        assert_eq!(err.placeholders, vec!["{TARGET_DIR}".to_string()]);

        assert!(classify("convert <input> out.png").is_err());
    }

    #[test]
    fn test_first_match_wins_over_later_caution_rule() {
        // Matches both the system-path redirect rule (Dangerous) and the
        // system-path proximity rule (Caution); the earlier rule decides.
        let verdict = classify("echo 0 > /etc/motd").unwrap();
        assert_eq!(verdict.severity, Severity::Dangerous);
    }
}
