//! Command-line player for YM and PT3 chiptune files.
//!
//! Sniffs the input format, renders through the ay3 PSG core and streams
//! to the default audio device, or writes a WAV file with `--wav`.

mod args;
mod player_factory;

use std::fs;
use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use ay3::streaming::{AudioDevice, FrameRingBuffer};
use log::info;

use args::CliArgs;
use player_factory::{create_player, LoadedPlayer};

const SAMPLE_RATE: u32 = ay3_common::DEFAULT_SAMPLE_RATE;

/// Stereo frames rendered per chunk.
const CHUNK_FRAMES: usize = 1024;

fn main() -> ExitCode {
    env_logger::init();

    let args = match CliArgs::parse() {
        Ok(args) => args,
        Err(message) => {
            eprintln!("error: {message}");
            eprintln!("{}", CliArgs::usage());
            return ExitCode::FAILURE;
        }
    };

    if args.show_help {
        println!("{}", CliArgs::usage());
        return ExitCode::SUCCESS;
    }

    let Some(path) = args.file_path.as_deref() else {
        eprintln!("{}", CliArgs::usage());
        return ExitCode::FAILURE;
    };

    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) => {
            eprintln!("error: cannot read {path}: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut player = match create_player(&data, SAMPLE_RATE) {
        Ok(player) => player,
        Err(message) => {
            eprintln!("error: {message}");
            return ExitCode::FAILURE;
        }
    };

    if let Some(volume) = args.volume {
        player.set_master_volume(volume);
    }

    println!("{}", player.describe());

    let seconds = args.seconds.unwrap_or_else(|| {
        (player.frame_count() / player.frame_rate().max(1)).max(1)
    });
    let total_frames = seconds as usize * SAMPLE_RATE as usize;

    let result = match args.wav_path.as_deref() {
        Some(wav_path) => render_to_wav(&mut player, total_frames, wav_path),
        None => stream_to_device(&mut player, total_frames),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn render_to_wav(
    player: &mut LoadedPlayer,
    total_frames: usize,
    wav_path: &str,
) -> Result<(), String> {
    player.play();
    let mut buffer = vec![0.0f32; total_frames * 2];
    player.generate_frames_into(&mut buffer);
    ay3::export::write_wav_stereo(wav_path, SAMPLE_RATE, &buffer).map_err(|e| e.to_string())?;
    info!("wrote {total_frames} frames to {wav_path}");
    Ok(())
}

fn stream_to_device(player: &mut LoadedPlayer, total_frames: usize) -> Result<(), String> {
    let ring = FrameRingBuffer::new(SAMPLE_RATE as usize / 4).map_err(|e| e.to_string())?;
    let device = AudioDevice::new(SAMPLE_RATE, ring.clone()).map_err(|e| e.to_string())?;

    player.play();
    device.play();

    let mut chunk = vec![0.0f32; CHUNK_FRAMES * 2];
    let mut rendered = 0usize;
    while rendered < total_frames {
        player.generate_frames_into(&mut chunk);

        let mut offset = 0usize;
        while offset < CHUNK_FRAMES {
            let written = ring.write(&chunk[offset * 2..]);
            if written == 0 {
                thread::sleep(Duration::from_millis(5));
            }
            offset += written;
        }
        rendered += CHUNK_FRAMES;
    }

    device.finish();
    device.wait_until_end();
    Ok(())
}
