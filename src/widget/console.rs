use std::error::Error;
use tokio::io::{ AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt };

use super::ChatWidget;
use crate::models::chat::{ ChatMessage, Role };

fn render(message: &ChatMessage) -> String {
    match message.role {
        Role::User => format!("you> {}\n", message.content),
        Role::Assistant => format!("assistant> {}\n", message.content),
    }
}

/// Drives a widget from line input: `/clear`, `/history`, `/quit`, anything else is sent.
pub async fn run_console<R, W>(
    widget: &ChatWidget,
    input: R,
    mut output: W
) -> Result<(), Box<dyn Error + Send + Sync>>
    where R: AsyncBufRead + Unpin, W: AsyncWrite + Unpin
{
    for message in widget.transcript().await {
        output.write_all(render(&message).as_bytes()).await?;
    }
    output.flush().await?;

    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "/quit" | "/exit" => break,
            "/clear" => {
                widget.clear().await;
                for message in widget.transcript().await {
                    output.write_all(render(&message).as_bytes()).await?;
                }
            }
            "/history" => {
                for message in widget.transcript().await {
                    output.write_all(render(&message).as_bytes()).await?;
                }
            }
            _ => {
                if widget.send_text(line.as_str()).await {
                    if let Some(reply) = widget.transcript().await.last() {
                        output.write_all(render(reply).as_bytes()).await?;
                    }
                }
            }
        }
        output.flush().await?;
    }

    Ok(())
}
