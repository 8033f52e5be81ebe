//! Control-side API
//!
//! The [`Controller`] is the only writer of parameter state. It keeps a
//! shadow [`PipelineConfig`], clamps and mirrors every change exactly as the
//! pipeline would, designs the coefficients and hands the audio thread a
//! ready-to-install [`Command`] per affected channel. Nothing here runs on
//! the audio thread.
//!
//! A change is all-or-nothing: if the command queue can't take every
//! command it produces, the call fails with [`EngineError::QueueFull`] and
//! the shadow state is left as it was.

use std::sync::Arc;

use parking_lot::Mutex;
use rtrb::Producer;
use tracing::{debug, info, warn};
use xover_dsp::{
    db_to_linear, Band, ChannelConfig, ChannelDesign, CompressorConfig, CompressorDesign,
    CompressorPreset, ConfigBlob, CrossoverConfig, CrossoverDesign, DelayConfig, DspError, EqConfig,
    EqDesign, GainConfig, LimiterConfig, LimiterDesign, Module, PipelineConfig, RoutingConfig,
    Source, Targets, Topology,
};

use crate::error::{EngineError, EngineResult};
use crate::message::Command;
use crate::telemetry::{SharedTelemetry, TelemetrySnapshot};

/// A controller shared by several control contexts (UI, remote, presets)
pub type SharedController = Arc<Mutex<Controller>>;

/// Non-real-time half of the engine
pub struct Controller {
    sample_rate: f32,
    config: PipelineConfig,
    producer: Producer<Command>,
    telemetry: Arc<SharedTelemetry>,
}

impl Controller {
    pub(crate) fn new(
        sample_rate: f32,
        config: PipelineConfig,
        producer: Producer<Command>,
        telemetry: Arc<SharedTelemetry>,
    ) -> Self {
        Self {
            sample_rate,
            config,
            producer,
            telemetry,
        }
    }

    pub fn into_shared(self) -> SharedController {
        Arc::new(Mutex::new(self))
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Settings as they will be once every queued command is installed
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn channel(&self, channel: usize) -> EngineResult<&ChannelConfig> {
        Ok(self.config.channel(channel)?)
    }

    pub fn telemetry(&self) -> TelemetrySnapshot {
        self.telemetry.snapshot()
    }

    /// Handle for meter readers that don't need the controller itself
    pub fn telemetry_handle(&self) -> Arc<SharedTelemetry> {
        Arc::clone(&self.telemetry)
    }

    /// Free command slots
    pub fn queue_slots(&self) -> usize {
        self.producer.slots()
    }

    /// False once the [`AudioProcessor`](crate::AudioProcessor) was dropped
    pub fn is_processor_alive(&self) -> bool {
        !self.producer.is_abandoned()
    }

    // ---------------------------------------------------------------------
    // Routing
    // ---------------------------------------------------------------------

    /// Replace the routing. Channel settings are not copied when a pair
    /// becomes linked here; use [`set_stereo_link`](Self::set_stereo_link)
    /// for that.
    pub fn set_routing(&mut self, routing: RoutingConfig) -> EngineResult<()> {
        if routing.sanitized() != routing {
            debug!("Out-of-range routing settings clamped");
        }
        let mut next = self.config;
        next.set_routing(routing);
        let commands = self.routing_commands(&next)?;
        self.commit(next, &commands)?;
        debug!("Routing replaced");
        Ok(())
    }

    pub fn set_source(&mut self, channel: usize, source: Source) -> EngineResult<Targets> {
        let mut next = self.config;
        let targets = next.set_source(channel, source)?;
        self.commit(next, &[Command::Routing(next.routing)])?;
        debug!("Set output {} source to {:?}", channel, source);
        Ok(targets)
    }

    pub fn set_mix_ratio(&mut self, channel: usize, ratio: f32) -> EngineResult<Targets> {
        let mut next = self.config;
        let targets = next.set_mix_ratio(channel, ratio)?;
        self.commit(next, &[Command::Routing(next.routing)])?;
        debug!(
            "Set output {} mix ratio to {}",
            channel, next.routing.mix_ratio[channel]
        );
        Ok(targets)
    }

    pub fn set_mute(&mut self, channel: usize, muted: bool) -> EngineResult<Targets> {
        let mut next = self.config;
        let targets = next.set_mute(channel, muted)?;
        self.commit(next, &[Command::Routing(next.routing)])?;
        debug!("Set output {} muted: {}", channel, muted);
        Ok(targets)
    }

    pub fn set_input_gain(&mut self, input: usize, gain: f32) -> EngineResult<()> {
        let mut next = self.config;
        next.set_input_gain(input, gain)?;
        self.commit(next, &[Command::Routing(next.routing)])?;
        debug!(
            "Set input {} gain to {}",
            input, next.routing.input_gain[input]
        );
        Ok(())
    }

    pub fn set_mono_sum(&mut self, enabled: bool) -> EngineResult<()> {
        let mut next = self.config;
        next.routing.set_mono_sum(enabled);
        self.commit(next, &[Command::Routing(next.routing)])?;
        debug!("Set mono sum: {}", enabled);
        Ok(())
    }

    /// Link or unlink an output pair. Linking copies the even channel's
    /// processing onto the odd one, which restarts from a clean state.
    pub fn set_stereo_link(&mut self, pair: usize, linked: bool) -> EngineResult<()> {
        let mut next = self.config;
        let targets = next.set_stereo_link(pair, linked)?;
        let mut commands = vec![Command::Routing(next.routing)];
        if linked {
            if let Some(partner) = targets.partner {
                commands.push(self.channel_command(&next, partner)?);
            }
        }
        self.commit(next, &commands)?;
        debug!("Set pair {} linked: {}", pair, linked);
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Channel modules (mirrored onto a linked partner)
    // ---------------------------------------------------------------------

    pub fn set_crossover(&mut self, channel: usize, config: CrossoverConfig) -> EngineResult<Targets> {
        log_clamped("crossover", channel, &config);
        let mut next = self.config;
        let targets = next.set_crossover(channel, config)?;
        self.publish_module(next, Module::Crossover, targets)?;
        debug!(
            "Set output {} crossover to {:?}",
            channel, next.channels[channel].crossover
        );
        Ok(targets)
    }

    pub fn set_eq(&mut self, channel: usize, config: EqConfig) -> EngineResult<Targets> {
        log_clamped("eq", channel, &config);
        let mut next = self.config;
        let targets = next.set_eq(channel, config)?;
        self.publish_module(next, Module::Eq, targets)?;
        debug!("EQ config update on output {}", channel);
        Ok(targets)
    }

    /// Replace one band. Only that band's filter restarts; the other bands
    /// keep their state.
    pub fn set_eq_band(&mut self, channel: usize, band_index: usize, band: Band) -> EngineResult<Targets> {
        if band.sanitized() != band {
            debug!("EQ band {} on output {} clamped", band_index, channel);
        }
        let mut next = self.config;
        let targets = next.set_eq_band(channel, band_index, band)?;
        let band = next.channels[channel].eq.bands[band_index];
        let coefficients = band.to_coefficients(self.sample_rate)?;
        let commands: Vec<Command> = targets
            .iter()
            .map(|ch| Command::EqBand {
                channel: ch,
                band_index,
                band,
                coefficients,
            })
            .collect();
        self.commit(next, &commands)?;
        debug!(
            "Set output {} band {} to {:?} {}Hz {}dB Q{}",
            channel, band_index, band.band_type, band.frequency, band.gain_db, band.q
        );
        Ok(targets)
    }

    /// Set gain for a single band, keeping its type, frequency and Q
    pub fn set_eq_band_gain(&mut self, channel: usize, band_index: usize, gain_db: f32) -> EngineResult<Targets> {
        let band = *self
            .channel(channel)?
            .eq
            .bands
            .get(band_index)
            .ok_or(DspError::InvalidBandIndex(band_index))?;
        self.set_eq_band(channel, band_index, band.with_gain(gain_db))
    }

    pub fn set_eq_settings(&mut self, channel: usize, pre_gain_db: f32, enabled: bool) -> EngineResult<Targets> {
        let mut next = self.config;
        let targets = next.set_eq_settings(channel, pre_gain_db, enabled)?;
        let pre_gain_db = next.channels[channel].eq.pre_gain_db;
        let pre_gain_linear = db_to_linear(pre_gain_db);
        let commands: Vec<Command> = targets
            .iter()
            .map(|ch| Command::EqSettings {
                channel: ch,
                pre_gain_db,
                enabled,
                pre_gain_linear,
            })
            .collect();
        self.commit(next, &commands)?;
        debug!(
            "Set output {} EQ pre-gain {}dB, enabled: {}",
            channel, pre_gain_db, enabled
        );
        Ok(targets)
    }

    pub fn set_compressor(&mut self, channel: usize, config: CompressorConfig) -> EngineResult<Targets> {
        log_clamped("compressor", channel, &config);
        let mut next = self.config;
        let targets = next.set_compressor(channel, config)?;
        self.publish_module(next, Module::Compressor, targets)?;
        debug!("Compressor update on output {}", channel);
        Ok(targets)
    }

    pub fn apply_compressor_preset(&mut self, channel: usize, preset: CompressorPreset) -> EngineResult<Targets> {
        let targets = self.set_compressor(channel, preset.config())?;
        info!("Applied {:?} compressor preset to output {}", preset, channel);
        Ok(targets)
    }

    pub fn set_limiter(&mut self, channel: usize, config: LimiterConfig) -> EngineResult<Targets> {
        log_clamped("limiter", channel, &config);
        let mut next = self.config;
        let targets = next.set_limiter(channel, config)?;
        self.publish_module(next, Module::Limiter, targets)?;
        debug!("Limiter update on output {}", channel);
        Ok(targets)
    }

    /// Per-driver alignment; never mirrored
    pub fn set_delay(&mut self, channel: usize, config: DelayConfig) -> EngineResult<Targets> {
        log_clamped("delay", channel, &config);
        let mut next = self.config;
        let targets = next.set_delay(channel, config)?;
        self.publish_module(next, Module::Delay, targets)?;
        debug!(
            "Set output {} delay to {}ms",
            channel, next.channels[channel].delay.delay_ms
        );
        Ok(targets)
    }

    pub fn set_gain(&mut self, channel: usize, config: GainConfig) -> EngineResult<Targets> {
        log_clamped("gain", channel, &config);
        let mut next = self.config;
        let targets = next.set_gain(channel, config)?;
        self.publish_module(next, Module::Gain, targets)?;
        debug!(
            "Set output {} gain to {}dB",
            channel, next.channels[channel].gain.gain_db
        );
        Ok(targets)
    }

    // ---------------------------------------------------------------------
    // Whole pipeline
    // ---------------------------------------------------------------------

    /// Replace every setting. Each channel restarts from a clean state.
    pub fn set_config(&mut self, config: PipelineConfig) -> EngineResult<()> {
        let next = config.sanitized();
        let mut commands = vec![Command::Routing(next.routing)];
        for channel in 0..next.channels.len() {
            commands.push(self.channel_command(&next, channel)?);
        }
        self.commit(next, &commands)?;
        info!("Pipeline configuration replaced");
        Ok(())
    }

    /// Rewrite routing and crossovers for a speaker layout
    pub fn apply_topology(&mut self, topology: Topology) -> EngineResult<()> {
        let mut next = self.config;
        topology.apply(&mut next);
        self.set_config(next)?;
        info!("Applied topology '{}'", topology.name());
        Ok(())
    }

    pub fn flush_delays(&mut self) -> EngineResult<()> {
        self.commit(self.config, &[Command::FlushDelays])?;
        debug!("Delay lines flush requested");
        Ok(())
    }

    /// Clear all processing state; settings are kept
    pub fn reset(&mut self) -> EngineResult<()> {
        self.commit(self.config, &[Command::Reset])?;
        debug!("Pipeline reset requested");
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Preset exchange
    // ---------------------------------------------------------------------

    pub fn config_blob(&self) -> EngineResult<Vec<u8>> {
        Ok(self.config.to_blob()?)
    }

    pub fn load_config_blob(&mut self, bytes: &[u8]) -> EngineResult<()> {
        let config = PipelineConfig::from_blob(bytes)?;
        self.set_config(config)?;
        info!("Loaded pipeline blob ({} bytes)", bytes.len());
        Ok(())
    }

    pub fn module_blob(&self, module: Module, channel: usize) -> EngineResult<Vec<u8>> {
        Ok(self.config.module_blob(module, channel)?)
    }

    /// Load one module's settings onto `channel` (and its linked partner)
    pub fn load_module_blob(&mut self, module: Module, channel: usize, bytes: &[u8]) -> EngineResult<()> {
        let mut next = self.config;
        match next.load_module_blob(module, channel, bytes)? {
            None => {
                let commands = self.routing_commands(&next)?;
                self.commit(next, &commands)?
            }
            Some(targets) => self.publish_module(next, module, targets)?,
        }
        debug!("Loaded {:?} blob onto output {}", module, channel);
        Ok(())
    }

    /// Human-readable copy of the current settings
    pub fn config_json(&self) -> EngineResult<String> {
        Ok(serde_json::to_string_pretty(&self.config)?)
    }

    pub fn load_config_json(&mut self, json: &str) -> EngineResult<()> {
        let config: PipelineConfig = serde_json::from_str(json)?;
        self.set_config(config)
    }

    // ---------------------------------------------------------------------
    // Publishing
    // ---------------------------------------------------------------------

    /// Design one module for every target and publish
    fn publish_module(&mut self, next: PipelineConfig, module: Module, targets: Targets) -> EngineResult<()> {
        let commands = targets
            .iter()
            .map(|ch| self.module_command(&next, module, ch))
            .collect::<EngineResult<Vec<_>>>()?;
        self.commit(next, &commands)
    }

    fn module_command(&self, config: &PipelineConfig, module: Module, channel: usize) -> EngineResult<Command> {
        let settings = &config.channels[channel];
        let command = match module {
            Module::Routing => Command::Routing(config.routing),
            Module::Crossover => Command::Crossover {
                channel,
                config: settings.crossover,
                design: CrossoverDesign::compute(&settings.crossover, self.sample_rate)?,
            },
            Module::Eq => Command::Eq {
                channel,
                config: settings.eq,
                design: EqDesign::compute(&settings.eq, self.sample_rate)?,
            },
            Module::Compressor => Command::Compressor {
                channel,
                config: settings.compressor,
                design: CompressorDesign::compute(&settings.compressor, self.sample_rate),
            },
            Module::Limiter => Command::Limiter {
                channel,
                config: settings.limiter,
                design: LimiterDesign::compute(&settings.limiter, self.sample_rate),
            },
            Module::Delay => Command::Delay {
                channel,
                config: settings.delay,
            },
            Module::Gain => Command::Gain {
                channel,
                config: settings.gain,
            },
        };
        Ok(command)
    }

    /// Routing, plus a whole-channel update for every chain the new routing
    /// relinked
    fn routing_commands(&self, next: &PipelineConfig) -> EngineResult<Vec<Command>> {
        let mut commands = vec![Command::Routing(next.routing)];
        for (channel, settings) in next.channels.iter().enumerate() {
            if !settings.same_processing(&self.config.channels[channel]) {
                commands.push(self.channel_command(next, channel)?);
            }
        }
        Ok(commands)
    }

    fn channel_command(&self, config: &PipelineConfig, channel: usize) -> EngineResult<Command> {
        let settings = config.channels[channel];
        Ok(Command::Channel {
            channel,
            config: settings,
            design: ChannelDesign::compute(&settings, self.sample_rate)?,
        })
    }

    /// Queue every command or none, then adopt `next` as the shadow state
    fn commit(&mut self, next: PipelineConfig, commands: &[Command]) -> EngineResult<()> {
        let free = self.producer.slots();
        if free < commands.len() {
            self.telemetry.record_dropped();
            warn!(
                "Command queue full ({} needed, {} free) - update dropped",
                commands.len(),
                free
            );
            return Err(EngineError::QueueFull);
        }
        for &command in commands {
            self.producer
                .push(command)
                .map_err(|_| EngineError::QueueFull)?;
        }
        self.config = next;
        Ok(())
    }
}

fn log_clamped<T: ConfigBlob + Copy + PartialEq>(module: &str, channel: usize, requested: &T) {
    if requested.sanitize() != *requested {
        debug!("Out-of-range {} settings for output {} clamped", module, channel);
    }
}
