use std::process::{Command, Output};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::system::availability::RetryableAvailability;

const PLAYERCTL_BACKOFF: Duration = Duration::from_secs(10);

static PLAYERCTL_AVAILABLE: Lazy<bool> = Lazy::new(|| {
    Command::new("playerctl")
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
});

/// Playback operations the knobs drive. Implementations log their own
/// failures; callers treat an `Err` as a no-op.
pub trait Player: Send + Sync {
    fn play(&self) -> Result<()>;
    fn pause(&self) -> Result<()>;
    fn stop(&self) -> Result<()>;
    fn next(&self) -> Result<()>;
    fn previous(&self) -> Result<()>;
    fn is_playing(&self) -> Result<bool>;
    fn volume(&self) -> Result<u32>;
    fn set_volume(&self, percent: u32) -> Result<()>;

    fn current_track(&self) -> Result<Option<String>> {
        Ok(None)
    }
}

/// Drives an MPRIS media player through the `playerctl` command line tool.
#[derive(Debug, Clone)]
pub struct PlayerctlPlayer {
    player: String,
    availability: Arc<RetryableAvailability>,
}

impl PlayerctlPlayer {
    pub fn new(player: impl Into<String>) -> Self {
        Self {
            player: player.into(),
            availability: Arc::new(RetryableAvailability::new(
                *PLAYERCTL_AVAILABLE,
                PLAYERCTL_BACKOFF,
            )),
        }
    }

    pub fn is_available(&self) -> bool {
        *PLAYERCTL_AVAILABLE && self.availability.current()
    }

    fn should_attempt(&self) -> bool {
        let (available, retrying) = self.availability.try_acquire();
        if retrying {
            info!(player = %self.player, "retrying playerctl backend");
        }
        available
    }

    fn run(&self, args: &[&str]) -> Result<String> {
        if !*PLAYERCTL_AVAILABLE {
            bail!("playerctl not installed");
        }
        if !self.should_attempt() {
            bail!("playerctl backend currently unavailable");
        }

        let output = Command::new("playerctl")
            .arg("--player")
            .arg(&self.player)
            .args(args)
            .output()
            .with_context(|| format!("failed to execute playerctl {args:?}"))?;

        if !output.status.success() {
            let message = failure_message(&output);
            self.note_failure(&message);
            bail!("playerctl {args:?} failed: {message}");
        }

        if self.availability.mark_available() {
            info!(player = %self.player, "playerctl backend is available again");
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Backs off only while the player itself is gone. Any other failure
    /// belongs to the one call that produced it.
    fn note_failure(&self, message: &str) {
        if !reports_missing_player(message) {
            debug!(player = %self.player, reason = %message, "playerctl call failed");
            return;
        }
        if self.availability.mark_unavailable() {
            warn!(
                player = %self.player,
                reason = %message,
                "playerctl backend temporarily disabled"
            );
        }
    }

    fn command(&self, verb: &str) -> Result<()> {
        self.run(&[verb]).map(|_| ())
    }
}

fn failure_message(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let message = format!("{stderr}{stdout}").trim().to_string();
    if message.is_empty() {
        format!("exit status {}", output.status.code().unwrap_or(-1))
    } else {
        message
    }
}

fn reports_missing_player(message: &str) -> bool {
    message.contains("No players found") || message.contains("No player could handle")
}

fn parse_volume(output: &str) -> Result<u32> {
    static VOLUME_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(\d+(?:\.\d+)?)").expect("volume pattern is valid")
    });
    let raw = VOLUME_RE
        .captures(output)
        .and_then(|capture| capture.get(1))
        .ok_or_else(|| anyhow!("could not parse playerctl volume output: {output}"))?
        .as_str();
    let fraction: f64 = raw
        .parse()
        .with_context(|| format!("invalid volume value {raw}"))?;
    Ok((fraction * 100.0).round().max(0.0) as u32)
}

fn volume_argument(percent: u32) -> String {
    format!("{:.2}", f64::from(percent) / 100.0)
}

impl Player for PlayerctlPlayer {
    fn play(&self) -> Result<()> {
        self.command("play")
    }

    fn pause(&self) -> Result<()> {
        self.command("pause")
    }

    fn stop(&self) -> Result<()> {
        self.command("stop")
    }

    fn next(&self) -> Result<()> {
        self.command("next")
    }

    fn previous(&self) -> Result<()> {
        self.command("previous")
    }

    fn is_playing(&self) -> Result<bool> {
        let status = self.run(&["status"])?;
        Ok(status.eq_ignore_ascii_case("playing"))
    }

    fn volume(&self) -> Result<u32> {
        parse_volume(&self.run(&["volume"])?)
    }

    fn set_volume(&self, percent: u32) -> Result<()> {
        let value = volume_argument(percent);
        debug!(percent, %value, "setting player volume");
        self.run(&["volume", &value]).map(|_| ())
    }

    fn current_track(&self) -> Result<Option<String>> {
        let url = self.run(&["metadata", "xesam:url"])?;
        Ok(if url.is_empty() { None } else { Some(url) })
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    use std::sync::Mutex;

    use crossbeam_channel::{Receiver, Sender};

    #[test]
    fn parses_fractional_volume() {
        assert_eq!(parse_volume("0.300000").unwrap(), 30);
        assert_eq!(parse_volume("1.25\n").unwrap(), 125);
        assert_eq!(parse_volume("0").unwrap(), 0);
        assert!(parse_volume("No players found").is_err());
    }

    #[test]
    fn failed_metadata_lookup_does_not_block_next_command() {
        let player = PlayerctlPlayer::new("vlc");
        player.availability.mark_available();

        player.note_failure("exit status 1");
        player.note_failure("No metadata for key xesam:url");

        assert!(player.should_attempt());
        assert!(player.availability.current());
    }

    #[test]
    fn missing_player_starts_backoff() {
        let player = PlayerctlPlayer::new("vlc");
        player.availability.mark_available();

        player.note_failure("No players found");

        assert!(!player.availability.current());
        assert!(!player.should_attempt());
    }

    #[test]
    fn recognises_missing_player_messages() {
        assert!(reports_missing_player("No players found"));
        assert!(reports_missing_player(
            "No player could handle this command"
        ));
        assert!(!reports_missing_player("exit status 1"));
    }

    #[test]
    fn volume_argument_passes_boost_through() {
        assert_eq!(volume_argument(30), "0.30");
        assert_eq!(volume_argument(0), "0.00");
        assert_eq!(volume_argument(150), "1.50");
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum PlayerCall {
        Play,
        Pause,
        Stop,
        Next,
        Previous,
        SetVolume(u32),
    }

    #[derive(Debug)]
    pub struct MockPlayerState {
        pub playing: bool,
        pub volume: u32,
        pub fail: bool,
        pub history: Vec<PlayerCall>,
        /// When set, `next()` signals the sender on entry and then waits on
        /// the receiver before it completes.
        pub next_gate: Option<(Sender<()>, Receiver<()>)>,
    }

    impl Default for MockPlayerState {
        fn default() -> Self {
            Self {
                playing: true,
                volume: 30,
                fail: false,
                history: Vec::new(),
                next_gate: None,
            }
        }
    }

    #[derive(Debug, Clone, Default)]
    pub struct MockPlayer {
        pub inner: Arc<Mutex<MockPlayerState>>,
    }

    impl MockPlayer {
        pub fn with_state(state: MockPlayerState) -> Self {
            Self {
                inner: Arc::new(Mutex::new(state)),
            }
        }

        pub fn history(&self) -> Vec<PlayerCall> {
            self.inner.lock().unwrap().history.clone()
        }

        pub fn count(&self, call: &PlayerCall) -> usize {
            self.history().iter().filter(|c| *c == call).count()
        }

        fn record(&self, call: PlayerCall) -> Result<()> {
            let mut state = self.inner.lock().unwrap();
            state.history.push(call.clone());
            if state.fail {
                bail!("mock player failure");
            }
            match call {
                PlayerCall::Play => state.playing = true,
                PlayerCall::Pause | PlayerCall::Stop => state.playing = false,
                PlayerCall::SetVolume(volume) => state.volume = volume,
                PlayerCall::Next | PlayerCall::Previous => {}
            }
            Ok(())
        }
    }

    impl Player for MockPlayer {
        fn play(&self) -> Result<()> {
            self.record(PlayerCall::Play)
        }

        fn pause(&self) -> Result<()> {
            self.record(PlayerCall::Pause)
        }

        fn stop(&self) -> Result<()> {
            self.record(PlayerCall::Stop)
        }

        fn next(&self) -> Result<()> {
            let gate = self.inner.lock().unwrap().next_gate.clone();
            if let Some((entered, release)) = gate {
                entered.send(()).ok();
                release.recv().ok();
            }
            self.record(PlayerCall::Next)
        }

        fn previous(&self) -> Result<()> {
            self.record(PlayerCall::Previous)
        }

        fn is_playing(&self) -> Result<bool> {
            let state = self.inner.lock().unwrap();
            if state.fail {
                bail!("mock player failure");
            }
            Ok(state.playing)
        }

        fn volume(&self) -> Result<u32> {
            Ok(self.inner.lock().unwrap().volume)
        }

        fn set_volume(&self, percent: u32) -> Result<()> {
            self.record(PlayerCall::SetVolume(percent))
        }
    }
}
