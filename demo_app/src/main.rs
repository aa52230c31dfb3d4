//! Headless orbit demo
//!
//! Spins a ring of models around an orbiting light, keeps a sprite facing
//! the camera and plays a short tone, all without a GPU. Usage:
//!
//! ```text
//! orbit_demo [seconds] [config.toml|config.ron]
//! ```

use rand::prelude::*;
use std::f32::consts::TAU;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use thiserror::Error;
use vesper_engine::config::AudioConfig;
use vesper_engine::foundation::logging;
use vesper_engine::foundation::math::{Mat4, Vec3};
use vesper_engine::prelude::*;
use vesper_engine::render::HeadlessFactory;
use vesper_engine::scene::VertexData;

const MODEL_COUNT: usize = 8;
const RING_RADIUS: f32 = 6.0;

#[derive(Error, Debug)]
enum DemoError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("invalid duration {0:?}")]
    Duration(String),
}

/// Rotates one model around its own axis and around the ring centre
struct Spinner {
    model: SceneObject<Model>,
    angle: Angle,
    spin_speed: f32,
    orbit_speed: f32,
}

impl Actor for Spinner {
    fn tick(&self, dt: f64) {
        let (orbit, spin) = self.angle.advance(dt as f32 * self.orbit_speed, dt as f32 * self.spin_speed);
        let position = Vec3::new(orbit.cos() * RING_RADIUS, 0.0, orbit.sin() * RING_RADIUS);
        self.model.write().params.matrix =
            Mat4::new_translation(&position) * Mat4::new_rotation(Vec3::y() * spin);
    }
}

/// Moves the light in a vertical circle
struct Orbiter {
    light: SceneObject<Light>,
    angle: Angle,
}

impl Actor for Orbiter {
    fn tick_early(&self, dt: f64) {
        let (angle, _) = self.angle.advance(dt as f32 * 0.5, 0.0);
        self.light.write().position = Vec3::new(0.0, angle.sin() * 4.0, angle.cos() * 4.0);
    }

    fn tick(&self, _dt: f64) {}
}

/// Two angles packed into one atomic so actors stay `Sync`
#[derive(Default)]
struct Angle(AtomicU64);

impl Angle {
    /// Advance both angles, wrapping at a full turn, and return the new values
    fn advance(&self, first: f32, second: f32) -> (f32, f32) {
        let unpack = |bits: u64| (f32::from_bits((bits >> 32) as u32), f32::from_bits(bits as u32));
        let pack = |(a, b): (f32, f32)| (u64::from(a.to_bits()) << 32) | u64::from(b.to_bits());

        let mut next = (0.0, 0.0);
        let _ = self.0.fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
            let (a, b) = unpack(bits);
            next = ((a + first) % TAU, (b + second) % TAU);
            Some(pack(next))
        });
        next
    }
}

fn tone(config: &AudioConfig, frequency: f32, seconds: f32) -> AudioBuffer {
    let frames = (config.sample_rate as f32 * seconds) as usize;
    let samples = (0..frames)
        .flat_map(|i| {
            let t = i as f32 / config.sample_rate as f32;
            let value = (t * frequency * TAU).sin();
            [value, value]
        })
        .collect();
    AudioBuffer::from_samples(samples).with_multiplier(0.2)
}

fn main() {
    if let Err(err) = run() {
        log::error!("{err}");
        eprintln!("orbit_demo: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), DemoError> {
    let mut args = std::env::args().skip(1);
    let seconds = match args.next() {
        Some(arg) => arg.parse::<f64>().map_err(|_| DemoError::Duration(arg))?,
        None => 3.0,
    };
    let config = match args.next().map(PathBuf::from) {
        Some(path) => EngineConfig::load_from_file(&path).map_err(EngineError::from)?,
        None => EngineConfig::default(),
    };
    logging::init_with_level(config.verbosity);

    let backend = HeadlessBackend::new().with_frame_time(Duration::from_millis(4));
    let ledger = Arc::clone(backend.ledger());
    let mut engine = Engine::new(config, Arc::new(backend.factory()))?;

    let mut rng = thread_rng();
    let index = engine
        .loader()
        .load_model(VertexData::quad(), LoadMode::Blocking)
        .map_err(EngineError::from)?;
    for i in 0..MODEL_COUNT {
        let model = SceneObject::new(Model::new(index));
        engine.bridge().register_model(&model);
        let spinner = Spinner {
            model,
            angle: Angle::default(),
            spin_speed: rng.gen_range(0.5..3.0),
            orbit_speed: 0.2 + i as f32 * 0.05,
        };
        engine.simulation().register_actor(Arc::new(spinner));
    }

    let light = SceneObject::new(Light::default());
    engine.bridge().register_light(&light);
    engine.simulation().register_actor(Arc::new(Orbiter {
        light,
        angle: Angle::default(),
    }));

    let sprite = SceneObject::new(Sprite {
        offset: 0.5,
        ..Sprite::default()
    });
    engine.bridge().register_sprite(&sprite);
    engine.bridge().set_camera(Camera {
        position: Vec3::new(0.0, 2.0, 12.0),
        ..Camera::default()
    });

    let beep = Arc::new(tone(&engine.config().audio, 440.0, 0.5));
    let audio = start_audio(&mut engine)?;
    engine.mixer().submit(Arc::clone(&beep)).map_err(EngineError::from)?;

    let mut frames = engine.frame_loop(backend);
    let stop = frames.stop_handle();
    let timer = thread::spawn(move || {
        thread::sleep(Duration::from_secs_f64(seconds));
        stop.stop();
    });

    engine.run(&mut frames)?;
    let _ = timer.join();
    drop(audio);

    let stats = engine.simulation().stats();
    log::info!(
        "{} ticks ({} overruns), {} frames of {} models, beep finished: {}",
        stats.ticks(),
        stats.overruns(),
        frames.frames_drawn(),
        engine.bridge().model_count(),
        beep.is_finished()
    );

    engine.loader().unload_model(index).map_err(EngineError::from)?;
    drop(frames);
    log::info!("Descriptors still alive: {}", ledger.live());
    Ok(())
}

/// Without a device the callback is pumped on a plain thread at the block rate
#[cfg(not(feature = "audio"))]
fn start_audio(engine: &mut Engine<HeadlessFactory>) -> Result<Option<AudioPump>, DemoError> {
    let Some(callback) = engine.take_mixer_callback() else {
        return Ok(None);
    };
    Ok(Some(AudioPump::start(callback, &engine.config().audio)))
}

#[cfg(feature = "audio")]
fn start_audio(
    engine: &mut Engine<HeadlessFactory>,
) -> Result<Option<vesper_engine::audio::backend::AudioOutput>, DemoError> {
    Ok(Some(engine.start_audio()?))
}

#[cfg(not(feature = "audio"))]
struct AudioPump {
    running: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

#[cfg(not(feature = "audio"))]
impl AudioPump {
    fn start(mut callback: MixerCallback, config: &AudioConfig) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let block = config.frames_per_buffer as usize * vesper_engine::audio::CHANNELS;
        let period = Duration::from_secs_f64(f64::from(config.frames_per_buffer) / f64::from(config.sample_rate));

        let flag = Arc::clone(&running);
        let thread = thread::spawn(move || {
            let mut out = vec![0.0; block];
            while flag.load(Ordering::Acquire) {
                callback.render(&mut out);
                thread::sleep(period);
            }
        });

        Self {
            running,
            thread: Some(thread),
        }
    }
}

#[cfg(not(feature = "audio"))]
impl Drop for AudioPump {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
