//! Command-line argument parsing.

use std::env;

/// Parsed command-line arguments.
#[derive(Debug, Default)]
pub struct CliArgs {
    /// Chiptune file to play.
    pub file_path: Option<String>,
    /// Playback length override in seconds.
    pub seconds: Option<u32>,
    /// Render to a WAV file instead of the audio device.
    pub wav_path: Option<String>,
    /// Master volume (0-1).
    pub volume: Option<f32>,
    /// Whether help was requested.
    pub show_help: bool,
}

impl CliArgs {
    /// Parse from the process arguments.
    pub fn parse() -> Result<Self, String> {
        let mut args = CliArgs::default();
        let mut iter = env::args().skip(1);

        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "-h" | "--help" => args.show_help = true,
                "--seconds" => {
                    let value = iter.next().ok_or("--seconds needs a value")?;
                    args.seconds =
                        Some(value.parse().map_err(|_| format!("bad --seconds: {value}"))?);
                }
                "--wav" => {
                    args.wav_path = Some(iter.next().ok_or("--wav needs a path")?);
                }
                "--volume" => {
                    let value = iter.next().ok_or("--volume needs a value")?;
                    args.volume =
                        Some(value.parse().map_err(|_| format!("bad --volume: {value}"))?);
                }
                other if other.starts_with('-') => {
                    return Err(format!("unknown option: {other}"));
                }
                path => {
                    if args.file_path.is_some() {
                        return Err("more than one input file given".into());
                    }
                    args.file_path = Some(path.to_string());
                }
            }
        }

        Ok(args)
    }

    /// Usage text.
    pub fn usage() -> &'static str {
        "Usage: ay3-play [options] <file.ym|file.pt3>\n\
         \n\
         Options:\n\
         \x20 --seconds <n>   stop after n seconds (default: one pass)\n\
         \x20 --wav <path>    render to a WAV file instead of playing\n\
         \x20 --volume <v>    master volume 0.0-1.0\n\
         \x20 -h, --help      show this help"
    }
}
