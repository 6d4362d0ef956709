//! Serving the dashboard to a local browser.
//!
//! Requests are answered from the loop's own task while it pauses between reads, so the page
//! always shows the state of the last finished iteration. The page reloads itself, there is no
//! push channel.

use std::fmt::Write as _;
use std::io;
use std::time::Duration;

use log::{debug, warn};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

use crate::link::LinkState;
use crate::presenter::{Dashboard, DisplayBuffer, Level};

/// Port the dashboard is served on unless told otherwise.
pub const DEFAULT_PORT: u16 = 8501;

/// Seconds between page reloads in the browser.
const REFRESH_SECS: u64 = 1;

/// Upper bound for reading one request and writing its response.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(1);

/// Request lines after which the header is not read any further.
const MAX_HEADER_LINES: usize = 100;

const CHART_WIDTH: f64 = 800.0;
const CHART_HEIGHT: f64 = 300.0;

pub struct Response {
    pub status: u16,
    pub reason: &'static str,
    pub content_type: &'static str,
    pub body: String,
}

impl Response {
    fn ok(content_type: &'static str, body: String) -> Self {
        Response {
            status: 200,
            reason: "OK",
            content_type,
            body,
        }
    }

    fn error(status: u16, reason: &'static str) -> Self {
        Response {
            status,
            reason,
            content_type: "text/plain; charset=utf-8",
            body: format!("{status} {reason}\n"),
        }
    }

    async fn write_to<W: AsyncWrite + Unpin>(&self, out: &mut W) -> io::Result<()> {
        let head = format!(
            "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nCache-Control: no-store\r\nConnection: close\r\n\r\n",
            self.status,
            self.reason,
            self.content_type,
            self.body.len()
        );
        out.write_all(head.as_bytes()).await?;
        out.write_all(self.body.as_bytes()).await?;
        out.flush().await
    }
}

/// Answers a request for `path`.
pub fn route(method: &str, path: &str, dashboard: &Dashboard) -> Response {
    if method != "GET" {
        return Response::error(405, "Method Not Allowed");
    }
    let path = path.split('?').next().unwrap_or(path);
    match path {
        "/" | "/index.html" => Response::ok("text/html; charset=utf-8", render_page(dashboard)),
        "/state.json" => match serde_json::to_string(dashboard) {
            Ok(body) => Response::ok("application/json", body),
            Err(e) => {
                warn!("Could not serialize dashboard state: {e}");
                Response::error(500, "Internal Server Error")
            }
        },
        _ => Response::error(404, "Not Found"),
    }
}

/// Reads one HTTP request from `stream` and answers it.
pub async fn handle<S>(stream: S, dashboard: &Dashboard) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut stream = BufReader::new(stream);

    let mut request_line = String::new();
    stream.read_line(&mut request_line).await?;
    let mut parts = request_line.split_whitespace();
    let response = match (parts.next(), parts.next()) {
        (Some(method), Some(path)) => {
            skip_headers(&mut stream).await?;
            route(method, path, dashboard)
        }
        _ => Response::error(400, "Bad Request"),
    };

    response.write_to(&mut stream).await?;
    stream.shutdown().await
}

async fn skip_headers<R: AsyncBufRead + Unpin>(stream: &mut R) -> io::Result<()> {
    let mut line = String::new();
    for _ in 0..MAX_HEADER_LINES {
        line.clear();
        if stream.read_line(&mut line).await? == 0 || line.trim().is_empty() {
            break;
        }
    }
    Ok(())
}

/// Answers incoming requests until `duration` has passed.
pub async fn serve_for(listener: &TcpListener, dashboard: &Dashboard, duration: Duration) {
    let deadline = tokio::time::sleep(duration);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => return,
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!("Could not accept connection: {e}");
                        continue;
                    }
                };
                match tokio::time::timeout(REQUEST_TIMEOUT, handle(stream, dashboard)).await {
                    Ok(Ok(())) => debug!("Served request from {peer}"),
                    Ok(Err(e)) => warn!("Request from {peer} failed: {e}"),
                    Err(_) => warn!("Request from {peer} timed out"),
                }
            }
        }
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Renders the full page for the current state.
pub fn render_page(dashboard: &Dashboard) -> String {
    let mut page = String::new();
    let _ = write!(
        page,
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta http-equiv="refresh" content="{REFRESH_SECS}">
<title>Balloon Telemetry HMI</title>
<style>
body {{ font-family: sans-serif; margin: 2rem; }}
.banner {{ padding: 0.5rem 1rem; border-radius: 0.3rem; }}
.success {{ background: #d4edda; }}
.warning {{ background: #fff3cd; }}
.error {{ background: #f8d7da; }}
.metric {{ font-size: 2.5rem; }}
</style>
</head>
<body>
<h1>🎈 High-Altitude Balloon Telemetry HMI</h1>
"#
    );

    if let Some(banner) = dashboard.banner() {
        let class = match banner.level {
            Level::Success => "success",
            Level::Warning => "warning",
            Level::Error => "error",
        };
        let _ = writeln!(
            page,
            r#"<p class="banner {class}" id="banner">{}</p>"#,
            escape_html(&banner.message)
        );
    }

    if !dashboard.is_halted() {
        let link = match dashboard.link() {
            LinkState::Connected => "connected",
            LinkState::Disconnected => "disconnected",
        };
        let _ = writeln!(
            page,
            r#"<p>Serial link: <span id="link">{link}</span></p>
<h2>Temperature (°C)</h2>
<p class="metric" id="temperature">{}</p>
<h2>Acceleration</h2>
{}
<h2>Events</h2>
<p id="event">{}</p>"#,
            dashboard.temperature_readout(),
            render_chart(dashboard.buffer()),
            dashboard
                .event()
                .map(|e| format!("⚠️ {}", escape_html(e)))
                .unwrap_or_default(),
        );
        if let Some(time) = dashboard.last_update() {
            let _ = writeln!(
                page,
                r#"<p><small>Last update {}</small></p>"#,
                time.format("%Y-%m-%d %H:%M:%S UTC")
            );
        }
    }

    page.push_str("</body>\n</html>\n");
    page
}

/// Draws every sample of the buffer as one polyline per axis.
fn render_chart(buffer: &DisplayBuffer) -> String {
    const COLORS: [&str; 3] = ["#1f77b4", "#ff7f0e", "#2ca02c"];

    let (mut min, mut max) = buffer
        .axes()
        .iter()
        .flat_map(|(_, values)| values.iter().copied())
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if min > max {
        (min, max) = (-1.0, 1.0);
    } else if min == max {
        (min, max) = (min - 1.0, max + 1.0);
    }

    let steps = buffer.len().saturating_sub(1).max(1) as f64;
    let mut svg = format!(
        r#"<svg id="chart" width="{CHART_WIDTH}" height="{CHART_HEIGHT}" viewBox="0 0 {CHART_WIDTH} {CHART_HEIGHT}" xmlns="http://www.w3.org/2000/svg">"#
    );
    for ((axis, values), color) in buffer.axes().iter().zip(COLORS) {
        let points = values
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_finite())
            .map(|(i, v)| {
                let x = i as f64 * CHART_WIDTH / steps;
                let y = CHART_HEIGHT - (v - min) / (max - min) * CHART_HEIGHT;
                format!("{x:.1},{y:.1}")
            })
            .collect::<Vec<_>>()
            .join(" ");
        let _ = write!(
            svg,
            r#"<polyline data-axis="{axis}" fill="none" stroke="{color}" points="{points}"/>"#
        );
    }
    svg.push_str("</svg>\n<p>");
    for ((axis, _), color) in buffer.axes().iter().zip(COLORS) {
        let _ = write!(svg, r#"<span style="color:{color}">■ {axis}</span> "#);
    }
    svg.push_str("</p>");
    svg
}

#[cfg(test)]
mod test {
    use super::{handle, render_page, route, serve_for};
    use crate::devices::pico::{Accel, TelemetryFrame};
    use crate::presenter::{Dashboard, Presenter};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn dashboard_with_shake() -> Dashboard {
        let mut dashboard = Dashboard::new();
        dashboard
            .present(&TelemetryFrame {
                temperature: 23.5,
                accel: Accel {
                    x: 2.5,
                    y: 0.0,
                    z: 9.8,
                },
            })
            .unwrap();
        dashboard
    }

    #[test]
    fn page_shows_readout_chart_and_event() {
        let page = render_page(&dashboard_with_shake());

        assert!(page.contains(r#"<p class="metric" id="temperature">23.50</p>"#));
        assert!(page.contains("High X acceleration detected!"));
        assert_eq!(page.matches("<polyline").count(), 3);
        assert!(page.contains(r#"http-equiv="refresh""#));
    }

    #[test]
    fn halted_page_shows_only_the_error() {
        let page = render_page(&Dashboard::halted("No USB device found! <check>"));

        assert!(page.contains("No USB device found! &lt;check&gt;"));
        assert!(!page.contains("id=\"temperature\""));
    }

    #[test]
    fn state_is_served_as_json() {
        let response = route("GET", "/state.json?t=1", &dashboard_with_shake());
        assert_eq!(response.status, 200);

        let state: serde_json::Value = serde_json::from_str(&response.body).unwrap();
        assert_eq!(state["temperature"], 23.5);
        assert_eq!(state["buffer"]["x"][0], 2.5);
        assert_eq!(state["event"], "High X acceleration detected!");
    }

    #[test]
    fn unknown_paths_and_methods_are_rejected() {
        let dashboard = Dashboard::new();
        assert_eq!(route("GET", "/favicon.ico", &dashboard).status, 404);
        assert_eq!(route("POST", "/", &dashboard).status, 405);
    }

    #[tokio::test]
    async fn answers_http_request() {
        let dashboard = dashboard_with_shake();
        let (mut client, server) = tokio::io::duplex(1024);

        let request = async {
            client
                .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n")
                .await
                .unwrap();
            let mut response = String::new();
            client.read_to_string(&mut response).await.unwrap();
            response
        };
        let (served, response) = tokio::join!(handle(server, &dashboard), request);

        served.unwrap();
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.contains("Content-Type: text/html"));
        assert!(response.contains("23.50"));
    }

    #[tokio::test]
    async fn garbage_request_is_bad_request() {
        let dashboard = Dashboard::new();
        let (mut client, server) = tokio::io::duplex(1024);

        let request = async {
            client.write_all(b"\r\n").await.unwrap();
            let mut response = String::new();
            client.read_to_string(&mut response).await.unwrap();
            response
        };
        let (served, response) = tokio::join!(handle(server, &dashboard), request);

        served.unwrap();
        assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"));
    }

    #[tokio::test]
    async fn serves_over_tcp_while_pausing() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let dashboard = dashboard_with_shake();

        let request = async {
            let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
            stream
                .write_all(b"GET /state.json HTTP/1.1\r\n\r\n")
                .await
                .unwrap();
            let mut response = String::new();
            stream.read_to_string(&mut response).await.unwrap();
            response
        };
        let (_, response) = tokio::join!(
            serve_for(&listener, &dashboard, Duration::from_millis(300)),
            request
        );

        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.contains("\"temperature\":23.5"));
    }
}
