use floodcache_core::{
    FetchOperation, FetchOperationOutcome, ModifyOperation, Peer, PeerId, QueryOperation,
    Validity,
};
use std::collections::BTreeSet;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};

const HELP: &str = "floodcache commands:\n  obtain <filename>\n  modify <filename>\n  exit";
const PROMPT: &str = "floodcache > ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Obtain(String),
    Modify(String),
    Exit,
    Empty,
    Help,
}

pub fn parse_command(line: &str) -> Command {
    let parts: Vec<&str> = line.split_whitespace().collect();
    match parts.as_slice() {
        [] => Command::Empty,
        ["exit"] => Command::Exit,
        ["obtain", filename] => Command::Obtain(filename.to_string()),
        ["modify", filename] => Command::Modify(filename.to_string()),
        _ => Command::Help,
    }
}

/// Interactive loop over `input`, writing to `out`. Returns on `exit` or end of input.
pub async fn run_console<R, W>(peer: Arc<Peer>, input: R, mut out: W) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();

    loop {
        write!(out, "{}", PROMPT)?;
        out.flush()?;

        let Some(line) = lines.next_line().await? else {
            return Ok(());
        };

        match parse_command(&line) {
            Command::Exit => return Ok(()),
            Command::Empty => {}
            Command::Help => writeln!(out, "{}", HELP)?,
            Command::Modify(filename) => {
                writeln!(out, "Modifying: {}", filename)?;
                match ModifyOperation::new(peer.clone()).run(&filename).await {
                    Ok(result) => writeln!(
                        out,
                        "{} is now at version {} ({} invalidations sent)",
                        filename, result.version, result.invalidations_sent
                    )?,
                    Err(error) => writeln!(out, "Cannot modify {}: {}", filename, error)?,
                }
            }
            Command::Obtain(filename) => {
                if peer.entries().has_file(&filename).await == Validity::Valid {
                    writeln!(out, "File already exists in your computer.")?;
                    continue;
                }
                writeln!(out, "Obtaining: {}", filename)?;

                let sources = match QueryOperation::new(peer.clone()).search(&filename).await {
                    Ok(sources) => sources,
                    Err(error) => {
                        writeln!(out, "Search failed: {}", error)?;
                        continue;
                    }
                };
                if sources.is_empty() {
                    writeln!(out, "File not available in the network. Please try again")?;
                    continue;
                }

                choose_and_fetch(&peer, &filename, &sources, &mut lines, &mut out).await?;
            }
        }
    }
}

async fn choose_and_fetch<R, W>(
    peer: &Arc<Peer>,
    filename: &str,
    sources: &BTreeSet<PeerId>,
    lines: &mut Lines<R>,
    out: &mut W,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let listed = sources
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ");

    loop {
        write!(out, "Choose the peer you want to download from: [{}] > ", listed)?;
        out.flush()?;

        let Some(choice) = lines.next_line().await? else {
            return Ok(());
        };
        let choice = choice.trim();

        if choice == "cancel" {
            writeln!(out, "Operation cancelled")?;
            return Ok(());
        }

        let Some(source) = choice.parse::<PeerId>().ok().filter(|id| sources.contains(id))
        else {
            continue;
        };

        match FetchOperation::new(peer.clone()).run_from(source, filename).await {
            Ok(FetchOperationOutcome::Fetched(result)) => {
                writeln!(
                    out,
                    "Successfully copied {} from peer {} (version {})",
                    filename, source, result.metadata.version
                )?;
                return Ok(());
            }
            Ok(_) => writeln!(out, "Peer {} can no longer serve {}. Please try again", source, filename)?,
            Err(error) => {
                writeln!(out, "{}", error)?;
                writeln!(out, "The peer is not currently available. Please try again")?;
            }
        }
    }
}
