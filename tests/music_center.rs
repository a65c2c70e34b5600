use music_center::{Config, CoverArt, MusicCenter};
use std::fs;
use std::path::{Path, PathBuf};

fn config_in(dir: &Path) -> Config {
    let mut config = Config::default();
    config.database_path = dir.join("state").join("music-center.db");
    config.logging.directory = dir.join("logs");
    config.library.sort_entries = true;
    config
}

fn music_tree(root: &Path) -> PathBuf {
    let artist = root.join("Artist1");
    fs::create_dir_all(&artist).unwrap();
    fs::create_dir_all(root.join("Artist2")).unwrap();
    for name in ["song1.mp3", "song2.wav", "notes.txt", "cover.jpg"] {
        fs::write(artist.join(name), b"").unwrap();
    }
    artist
}

#[tokio::test]
async fn state_survives_a_restart() {
    let workspace = tempfile::tempdir().unwrap();
    let music = tempfile::tempdir().unwrap();
    let artist = music_tree(music.path());
    let song = artist.join("song1.mp3");

    {
        let center = MusicCenter::open(config_in(workspace.path())).unwrap();
        let artists = center.set_root(music.path()).await.unwrap().current().unwrap();
        let names: Vec<&str> = artists.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["Artist1", "Artist2"]);

        let entries = center.tracks_for(&artist).await.current().unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["song1.mp3", "song2.wav"]);
        assert_eq!(center.cover_art(&artist).await, CoverArt::File(artist.join("cover.jpg")));

        center.create_playlist("Road Trip").await.unwrap();
        center.add_track("Road Trip", &song).await.unwrap();
        center.select_playlist("Road Trip").await.unwrap();
    }

    let center = MusicCenter::open(config_in(workspace.path())).unwrap();
    let restored = center.restore().await.unwrap();
    assert_eq!(restored.root.as_deref(), Some(music.path()));
    assert_eq!(restored.artists.len(), 2);
    assert_eq!(restored.selected_playlist.as_deref(), Some("Road Trip"));

    assert_eq!(center.list_playlists().await, vec!["Road Trip"]);
    assert_eq!(center.list_tracks("Road Trip").await, vec![song.clone()]);

    let summaries = center.playlist_summaries().await;
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].track_count, 1);
}

#[tokio::test]
async fn bad_input_is_reported_not_persisted() {
    let workspace = tempfile::tempdir().unwrap();
    let center = MusicCenter::open(config_in(workspace.path())).unwrap();

    assert!(center.set_root("/no/such/music").await.unwrap_err().is_filesystem());
    assert_eq!(center.restore().await.unwrap().root, None);

    assert!(center.create_playlist("x'; DROP TABLE playlists;--").await.is_err());
    assert!(center.add_track("Missing", "/music/a.mp3").await.unwrap_err().is_persistence());
    assert!(center.list_playlists().await.is_empty());

    let description = center.describe("/no/such/track.mp3").await;
    assert_eq!(description.display_title(), "track");
    assert_eq!(description.display_artist(), "Unknown Artist");
}
