//! JSON-lines bridge onto the message bus.
//!
//! Each input line is one message object. Orchestrator requests are forwarded
//! as-is and every outcome for the tabs seen on input is written back as one
//! line, so an external page script can play both trigger and presenter.

use std::collections::HashSet;

use color_eyre::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::bus::Bus;
use crate::message::{Message, PresenterMessage};

async fn forward_requests<R>(
    bus: Bus,
    input: R,
    outcomes: mpsc::UnboundedSender<PresenterMessage>,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let presenters = bus.presenters();
    let mut tabs = HashSet::new();
    let mut lines = input.lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<Message>(&line) {
            Ok(Message::Orchestrator(request)) => {
                let tab = request.tab_id();
                if tabs.insert(tab) {
                    presenters.attach(tab, outcomes.clone());
                }
                debug!("forwarding request for {tab}");
                bus.send_to_orchestrator(request)?;
            }
            Ok(Message::Presenter(message)) => {
                warn!("ignoring presenter message on input: {message:?}");
            }
            Err(e) => warn!("skipping malformed message: {e}"),
        }
    }

    info!("input closed, waiting for {} tab(s) to finish", tabs.len());
    Ok(())
}

async fn write_outcomes<W>(
    mut outcomes: mpsc::UnboundedReceiver<PresenterMessage>,
    mut output: W,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = outcomes.recv().await {
        let mut line = serde_json::to_string(&message)?;
        line.push('\n');
        output.write_all(line.as_bytes()).await?;
        output.flush().await?;
    }
    Ok(())
}

/// Runs until `input` is exhausted and every request read from it has been
/// answered.
pub async fn serve<R, W>(bus: Bus, input: R, output: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::try_join!(forward_requests(bus, input, tx), write_outcomes(rx, output))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;
    use crate::orchestrator::Orchestrator;
    use crate::testing::{extractor, CannedRecognizer, FixedScreen};

    async fn run(input: &str, answer: std::result::Result<&str, &str>) -> Vec<Value> {
        let (bus, inbox) = Bus::new();
        let orchestrator = Orchestrator::new(
            inbox,
            bus.presenters(),
            extractor(FixedScreen::white(32, 32), CannedRecognizer::new(answer)),
        );
        let running = tokio::spawn(orchestrator.start());

        let mut output = Vec::new();
        serve(bus, input.as_bytes(), &mut output).await.unwrap();
        running.await.unwrap().unwrap();

        String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn answers_each_request_with_one_line() {
        let input = concat!(
            r#"{"action":"CAPTURE_AND_EXTRACT","area":{"x":0,"y":0,"width":10,"height":10},"tabId":4}"#,
            "\n",
            "not json\n",
            "\n",
            r#"{"action":"START_SELECTION"}"#,
            "\n",
        );

        let lines = run(input, Ok("Hello")).await;
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["action"], "SHOW_RESULT");
        assert_eq!(lines[0]["text"], "Hello");
        assert!(lines[0]["debugImage"]
            .as_str()
            .unwrap()
            .starts_with("data:image/png;base64,"));
    }

    #[tokio::test]
    async fn failures_are_written_as_errors() {
        let input = concat!(
            r#"{"action":"CAPTURE_AND_EXTRACT","area":{"x":0,"y":0,"width":0,"height":10},"tabId":1}"#,
            "\n",
        );

        let lines = run(input, Ok("unused")).await;
        assert_eq!(
            lines,
            vec![json!({"action": "SHOW_ERROR", "message": "Invalid selection area"})]
        );
    }

    #[tokio::test]
    async fn extreme_offsets_still_get_an_answer() {
        let input = concat!(
            r#"{"action":"CAPTURE_AND_EXTRACT","area":{"x":-9223372036854775808,"y":0,"width":10,"height":10},"tabId":4}"#,
            "\n",
            r#"{"action":"CAPTURE_AND_EXTRACT","area":{"x":-1e300,"y":0,"width":10,"height":10},"tabId":4}"#,
            "\n",
        );

        let lines = run(input, Ok("unused")).await;
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["action"], "SHOW_ERROR");
        assert!(lines[0]["message"]
            .as_str()
            .unwrap()
            .starts_with("Selection offset is out of range"));
    }

    #[tokio::test]
    async fn empty_input_finishes_immediately() {
        assert!(run("", Ok("unused")).await.is_empty());
    }
}
