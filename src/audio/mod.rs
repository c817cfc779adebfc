use crate::{
    session::{PlaybackError, Transport},
    settings::{asset_path, Settings, SETTINGS_FILE},
    utils::*,
    PipelineSet,
};
use bevy::{app::AppExit, prelude::*};
pub use bevy_kira_audio::prelude::{
    AudioInstance as KiraInstance, AudioPlugin as KiraPlugin, AudioSource as KiraSource, *,
};
use tap::Pipe;

#[derive(Resource, Default)]
pub struct SongChannel;

#[derive(Resource, Default, Debug)]
pub struct SongInfo {
    /// Playback clock, resets when the song loops.
    pub pos: P64,
    pub dur: P64,
    pub title: String,
    /// Loaded but not necessarily playing.
    pub source: Option<Handle<KiraSource>>,
    pub handle: Handle<KiraInstance>,
}

fn load_song(
    settings: Res<Settings>,
    mut kira_sources: ResMut<Assets<KiraSource>>,
    mut song_info: ResMut<SongInfo>,
) {
    let path = asset_path(&settings.paths.song);

    let Ok(source) = StaticSoundData::from_file(&path, StaticSoundSettings::default())
        .map(|sound| KiraSource { sound })
    else {
        error!(
            "Could not load audio file {}, supply one or set paths.song in {}",
            path.display(),
            SETTINGS_FILE
        );
        return;
    };

    *song_info = SongInfo {
        dur: source.sound.duration().as_secs_f64().pipe(p64),
        pos: p64(0.),
        title: path
            .file_stem()
            .map_or_else(String::new, |stem| stem.to_string_lossy().into_owned()),
        source: Some(kira_sources.add(source)),
        handle: Handle::default(),
    };
}

pub fn update_playback(mut song_info: ResMut<SongInfo>, instances: Res<Assets<KiraInstance>>) {
    song_info.pos = instances
        .get(&song_info.handle)
        .and_then(|instance| instance.state().position())
        .map_or(song_info.pos, p64)
}

fn stop_song(mut exits: EventReader<AppExit>, song_channel: Res<AudioChannel<SongChannel>>) {
    if exits.iter().last().is_some() {
        song_channel.stop();
    }
}

/// The song channel seen through the score loop's [`Transport`] seam.
///
/// `play` only records the request; [`drive_song`] hands it to kira on the
/// next frame and mirrors the instance state back into `playing`.
#[derive(Resource, Default, Debug, Clone, PartialEq, Eq)]
pub struct SongTransport {
    pub loaded: bool,
    pub start_requested: bool,
    pub playing: bool,
}

impl Transport for SongTransport {
    fn play(&mut self) -> Result<(), PlaybackError> {
        if !self.loaded {
            return Err(PlaybackError::NotLoaded);
        }
        self.start_requested = true;
        Ok(())
    }

    fn is_playing(&self) -> bool {
        self.playing
    }
}

pub fn drive_song(
    song_channel: Res<AudioChannel<SongChannel>>,
    instances: Res<Assets<KiraInstance>>,
    mut song_info: ResMut<SongInfo>,
    mut transport: ResMut<SongTransport>,
) {
    transport.loaded = song_info.source.is_some();

    if std::mem::take(&mut transport.start_requested) {
        if let Some(source) = song_info.source.clone() {
            song_info.handle = song_channel.play(source).looped().handle();
            info!("playing {}", song_info.title);
        }
    }

    transport.playing = instances
        .get(&song_info.handle)
        .map_or(false, |instance| {
            matches!(instance.state(), PlaybackState::Playing { .. })
        });
}

pub struct SongPlugin;

impl Plugin for SongPlugin {
    fn build(&self, game: &mut App) {
        game.add_plugin(KiraPlugin)
            .init_resource::<Settings>()
            .init_resource::<SongInfo>()
            .init_resource::<SongTransport>()
            .add_audio_channel::<SongChannel>()
            .add_startup_system(load_song)
            .add_systems((drive_song, update_playback).chain().in_set(PipelineSet::Sense))
            .add_system(stop_song);
    }
}
