//! Placeholder substitution for scripted messages.
//!
//! Templates reference `{time}` and, when the event names a profile, the
//! profile fields `{id}`, `{name}`, `{department}`, `{risk}`, `{status}`,
//! `{last_seen}` and `{score:<attribute>}`.

use std::sync::OnceLock;

use chrono::NaiveTime;
use regex::Regex;

use crate::error::{Error, Result};
use crate::profile::ProfileRecord;

fn placeholder_regex() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\{([a-z_]+)(?::([A-Za-z0-9_]+))?\}").expect("placeholder pattern is valid")
    })
}

/// Values available to a template.
#[derive(Debug, Clone, Copy)]
pub struct TemplateContext<'a> {
    /// Wall-clock time of the tick.
    pub time: NaiveTime,
    /// Profile looked up for the event, if any.
    pub profile: Option<&'a ProfileRecord>,
}

/// Render a template against a context.
///
/// # Errors
///
/// Returns [`Error::Template`] for unknown placeholders, profile placeholders
/// without a profile, or a missing score attribute.
pub fn render(template: &str, ctx: &TemplateContext<'_>) -> Result<String> {
    let mut out = String::with_capacity(template.len() + 16);
    let mut last = 0;

    for caps in placeholder_regex().captures_iter(template) {
        let whole = caps.get(0).ok_or_else(|| Error::internal("empty capture"))?;
        out.push_str(&template[last..whole.start()]);
        let key = &caps[1];
        let arg = caps.get(2).map(|m| m.as_str());
        out.push_str(&resolve(template, key, arg, ctx)?);
        last = whole.end();
    }
    out.push_str(&template[last..]);
    Ok(out)
}

/// Check a template without rendering it.
///
/// `profile` is the record the template will be rendered against, so score
/// attributes are checked as well as placeholder names.
///
/// # Errors
///
/// Returns [`Error::Template`] if the template uses an unknown placeholder,
/// passes an argument to a placeholder other than `{score}`, uses profile
/// placeholders without a profile, or names a score the profile lacks.
pub fn check(template: &str, profile: Option<&ProfileRecord>) -> Result<()> {
    for caps in placeholder_regex().captures_iter(template) {
        let key = &caps[1];
        let arg = caps.get(2).map(|m| m.as_str());
        if arg.is_some() && key != "score" {
            return Err(Error::template(
                template,
                format!("{{{key}}} takes no argument"),
            ));
        }
        match key {
            "time" => {}
            "id" | "name" | "department" | "risk" | "status" | "last_seen" | "score" => {
                let Some(record) = profile else {
                    return Err(Error::template(
                        template,
                        format!("{{{key}}} requires a profile"),
                    ));
                };
                if key == "score" {
                    let attribute = arg.ok_or_else(|| {
                        Error::template(template, "{score} needs an attribute name")
                    })?;
                    if record.score(attribute).is_none() {
                        return Err(Error::template(
                            template,
                            format!("profile {} has no attribute '{attribute}'", record.id),
                        ));
                    }
                }
            }
            other => {
                return Err(Error::template(
                    template,
                    format!("unknown placeholder {{{other}}}"),
                ))
            }
        }
    }
    Ok(())
}

fn resolve(template: &str, key: &str, arg: Option<&str>, ctx: &TemplateContext<'_>) -> Result<String> {
    if key == "time" {
        return Ok(ctx.time.format("%H:%M:%S").to_string());
    }

    let profile = ctx
        .profile
        .ok_or_else(|| Error::template(template, format!("{{{key}}} requires a profile")))?;

    let value = match key {
        "id" => profile.id.clone(),
        "name" => profile.name.clone(),
        "department" => profile.department.clone(),
        "risk" => profile.risk.to_string(),
        "status" => profile.status.to_string(),
        "last_seen" => profile.last_seen.clone().unwrap_or_else(|| "n/a".to_string()),
        "score" => {
            let attribute =
                arg.ok_or_else(|| Error::template(template, "{score} needs an attribute name"))?;
            let score = profile.score(attribute).ok_or_else(|| {
                Error::template(
                    template,
                    format!("profile {} has no attribute '{attribute}'", profile.id),
                )
            })?;
            format_score(score)
        }
        other => {
            return Err(Error::template(
                template,
                format!("unknown placeholder {{{other}}}"),
            ))
        }
    };
    Ok(value)
}

/// Format a score without a trailing `.0` for whole numbers.
#[must_use]
pub fn format_score(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.1}")
    }
}
