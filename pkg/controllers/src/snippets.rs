//! Raw configuration snippets attached to global, frontend and backend
//! sections.

use tracing::info;

use pkg_lbapi::{LoadBalancerApi, SnippetScope};

use crate::classifier::{EntityKind, Outcome, classify};
use crate::diagnostics::Diagnostics;

/// Split an annotation value into snippet lines, dropping blank lines.
pub fn snippet_lines(value: Option<&str>) -> Vec<String> {
    value
        .unwrap_or_default()
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Bring the snippet at `scope` in line with `value`. An absent value
/// clears a previously set snippet.
pub async fn sync_snippet(
    lb: &dyn LoadBalancerApi,
    scope: SnippetScope,
    value: Option<&str>,
    kind: EntityKind,
    diag: &Diagnostics,
) -> Outcome {
    let mut outcome = Outcome::default();
    let label = format!("snippet {}", scope);
    let desired = snippet_lines(value);
    let live = match lb.snippet_get(&scope).await {
        Ok(lines) => lines,
        Err(e) => {
            diag.error(&label, e);
            return outcome;
        }
    };
    let c = classify(kind, &desired, &live);
    if !c.changed {
        return outcome;
    }
    match lb.snippet_set(&scope, &desired).await {
        Ok(()) => {
            info!("Config snippet for {} updated ({} lines)", scope, desired.len());
            outcome.record(kind, &scope.to_string(), c.fields);
        }
        Err(e) => diag.error(&label, e),
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Action;
    use pkg_lbapi::MemoryLoadBalancer;

    #[test]
    fn blank_lines_are_dropped() {
        assert_eq!(
            snippet_lines(Some("  http-request deny\n\n  option httplog ")),
            vec!["http-request deny".to_string(), "option httplog".to_string()]
        );
        assert!(snippet_lines(None).is_empty());
    }

    #[tokio::test]
    async fn snippet_set_once_then_stable() {
        let lb = MemoryLoadBalancer::new();
        let diag = Diagnostics::new();
        let scope = SnippetScope::Frontend("http".into());

        let first = sync_snippet(
            &lb,
            scope.clone(),
            Some("option forwardfor"),
            EntityKind::Snippet,
            &diag,
        )
        .await;
        assert_eq!(first.action, Action::Reload);

        let second = sync_snippet(
            &lb,
            scope.clone(),
            Some("option forwardfor"),
            EntityKind::Snippet,
            &diag,
        )
        .await;
        assert!(!second.changed());

        let cleared = sync_snippet(&lb, scope, None, EntityKind::Snippet, &diag).await;
        assert_eq!(cleared.action, Action::Reload);
        assert_eq!(lb.write_count("snippet_set"), 2);
    }

    #[tokio::test]
    async fn global_snippet_is_restart_class() {
        let lb = MemoryLoadBalancer::new();
        let diag = Diagnostics::new();
        let outcome = sync_snippet(
            &lb,
            SnippetScope::Global,
            Some("tune.ssl.lifetime 600"),
            EntityKind::GlobalSnippet,
            &diag,
        )
        .await;
        assert_eq!(outcome.action, Action::Restart);
    }
}
