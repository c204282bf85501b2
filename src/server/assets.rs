//! Static status page.
//!
//! The page polls `GET /elapsed-time` and shows the running/finished
//! state of the current session.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

// ============================================================================
// Public Functions
// ============================================================================

/// Renders the status page.
///
/// # Arguments
///
/// * `poll_interval` - How often the page polls the status endpoint
#[must_use]
pub fn build_status_page(poll_interval: Duration) -> String {
    let poll_ms = poll_interval.as_millis().max(100).to_string();
    STATUS_HTML_TEMPLATE.replace("$POLL_MS", &poll_ms)
}

// ============================================================================
// Constants
// ============================================================================

/// HTML template for the status page.
const STATUS_HTML_TEMPLATE: &str = r##"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>Stopwatch</title>
    <style>
        body {
            background: #1a1a2e;
            color: #ccc;
            font-family: monospace;
            padding: 40px;
            line-height: 1.6;
            text-align: center;
        }
        h1 { color: #e94560; margin-bottom: 20px; }
        #time { color: #fff; font-size: 6em; }
        #state { color: #4ade80; font-weight: bold; }
        .error { color: #e94560 !important; }
    </style>
</head>
<body>
    <h1>Stopwatch</h1>
    <div id="state">Connecting...</div>
    <div id="time">-:--.---</div>
    <script>
        const pad = (n, w) => String(n).padStart(w, '0');
        async function poll() {
            const state = document.getElementById('state');
            const time = document.getElementById('time');
            try {
                const res = await fetch('/elapsed-time');
                const body = await res.json();
                if (!res.ok) {
                    state.textContent = body.error;
                    state.className = 'error';
                } else if (body.status === 'START') {
                    state.textContent = 'Timing...';
                    state.className = '';
                } else {
                    state.textContent = 'Finished';
                    state.className = '';
                    time.textContent = body.minutes + ':' + pad(body.seconds, 2) + '.' + pad(body.milliseconds, 3);
                }
            } catch (e) {
                state.textContent = 'Bridge unreachable';
                state.className = 'error';
            }
        }
        poll();
        setInterval(poll, $POLL_MS);
    </script>
</body>
</html>"##;

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_interval_substituted() {
        let html = build_status_page(Duration::from_millis(250));
        assert!(html.contains("setInterval(poll, 250)"));
        assert!(!html.contains("$POLL_MS"));
    }

    #[test]
    fn test_poll_interval_has_floor() {
        let html = build_status_page(Duration::from_millis(1));
        assert!(html.contains("setInterval(poll, 100)"));
    }

    #[test]
    fn test_page_polls_status_endpoint() {
        let html = build_status_page(Duration::from_secs(1));
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("fetch('/elapsed-time')"));
    }
}
