//! UI Routes - HTML dashboard for qmap-ts (vanilla ES6+, no frameworks)

use axum::{
    response::{Html, IntoResponse},
    routing::get,
    Router,
};

use crate::AppState;

/// Build UI routes
pub fn ui_routes() -> Router<AppState> {
    Router::new().route("/", get(dashboard_page))
}

/// Dashboard page - Start/stop controls plus live progress via SSE
async fn dashboard_page() -> impl IntoResponse {
    Html(
        r#"
<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>qmap-ts - Topic Standardization</title>
    <style>
        body {
            font-family: system-ui, -apple-system, sans-serif;
            max-width: 900px;
            margin: 40px auto;
            padding: 20px;
            line-height: 1.6;
        }
        h1 {
            color: #333;
            border-bottom: 2px solid #0066cc;
            padding-bottom: 10px;
        }
        #status {
            background: #f5f5f5;
            padding: 20px;
            border-radius: 4px;
            margin: 20px 0;
        }
        .progress-bar {
            width: 100%;
            height: 30px;
            background: #e0e0e0;
            border-radius: 4px;
            overflow: hidden;
            margin: 10px 0;
        }
        .progress-fill {
            height: 100%;
            background: #0066cc;
            transition: width 0.3s ease;
        }
        .counters {
            display: flex;
            gap: 30px;
            flex-wrap: wrap;
        }
        .counters div {
            min-width: 140px;
        }
        .counters strong {
            display: block;
            font-size: 24px;
            color: #0066cc;
        }
        #log {
            background: #f5f5f5;
            border: 1px solid #ccc;
            border-radius: 4px;
            height: 260px;
            overflow-y: auto;
            padding: 10px;
            font-family: monospace;
            font-size: 13px;
            white-space: pre-wrap;
        }
        .button {
            display: inline-block;
            padding: 10px 20px;
            background: #0066cc;
            color: white;
            border: none;
            border-radius: 4px;
            margin: 10px 5px;
            font-size: 16px;
            cursor: pointer;
        }
        .button:hover {
            background: #0052a3;
        }
        .button:disabled {
            background: #aaa;
            cursor: default;
        }
        .button.stop {
            background: #cc3300;
        }
        .button.stop:hover {
            background: #a32900;
        }
        .button.stop:disabled {
            background: #aaa;
        }
    </style>
</head>
<body>
    <h1>Question Topic Standardization</h1>
    <p>Maps exam questions onto the master taxonomy with AI-assisted classification across all 40 subjects.</p>

    <p>
        <button id="start-btn" class="button" onclick="startRun()">Start Standardization</button>
        <button id="stop-btn" class="button stop" onclick="stopRun()" disabled>Stop</button>
    </p>

    <div id="status">
        <p><strong>Status:</strong> <span id="state">Idle</span></p>
        <p><strong>Current Subject:</strong> <span id="subject">-</span></p>
        <p><strong>Question:</strong> <span id="progress-text">0 / 0</span></p>
        <div class="progress-bar">
            <div class="progress-fill" id="progress-fill" style="width: 0%"></div>
        </div>
        <p><strong>Current Topic:</strong> <span id="topic">-</span>
           (confidence <span id="confidence">-</span>)</p>
        <div class="counters">
            <div>Processed<strong id="processed">0</strong></div>
            <div>Subjects Done<strong id="subjects-done">0 / 40</strong></div>
            <div>Elapsed<strong id="elapsed">0m 0s</strong></div>
        </div>
    </div>

    <h2>Activity Log</h2>
    <div id="log"></div>

    <p><small>Module: qmap-ts v0.1.0 | Port 5720</small></p>

    <script>
        function render(s) {
            const stateEl = document.getElementById('state');
            stateEl.textContent = s.is_running ? 'Running' : (s.state || 'Idle');

            document.getElementById('subject').textContent = s.current_subject || '-';
            document.getElementById('progress-text').textContent =
                s.current_question + ' / ' + s.total_questions;

            const pct = s.total_questions > 0
                ? Math.round(100 * s.current_question / s.total_questions)
                : 0;
            document.getElementById('progress-fill').style.width = pct + '%';

            document.getElementById('topic').textContent = s.current_topic || '-';
            document.getElementById('confidence').textContent =
                s.confidence != null ? s.confidence.toFixed(2) : '-';

            document.getElementById('processed').textContent = s.processed_total;
            document.getElementById('subjects-done').textContent =
                s.subjects_completed + ' / 40';
            document.getElementById('elapsed').textContent =
                Math.floor(s.elapsed_seconds / 60) + 'm ' + (s.elapsed_seconds % 60) + 's';

            const log = document.getElementById('log');
            log.textContent = s.logs
                .map((entry) => '[' + entry.time + '] ' + entry.message)
                .join('\n');
            log.scrollTop = log.scrollHeight;

            document.getElementById('start-btn').disabled = s.is_running;
            document.getElementById('stop-btn').disabled = !s.is_running;
        }

        async function startRun() {
            const resp = await fetch('/start', { method: 'POST' });
            if (!resp.ok) {
                const body = await resp.json().catch(() => null);
                alert(body && body.error ? body.error.message : 'Failed to start run');
            }
        }

        async function stopRun() {
            const resp = await fetch('/stop', { method: 'POST' });
            if (!resp.ok) {
                const body = await resp.json().catch(() => null);
                alert(body && body.error ? body.error.message : 'Failed to stop run');
            }
        }

        const source = new EventSource('/events');
        source.addEventListener('StatusTick', (e) => {
            render(JSON.parse(e.data));
        });
        source.onerror = () => {
            document.getElementById('state').textContent = 'Disconnected';
        };

        // Paint the current snapshot before the first tick arrives
        fetch('/status')
            .then((resp) => resp.json())
            .then(render)
            .catch(() => {});
    </script>
</body>
</html>
        "#,
    )
}
