// tests/load_tests.rs

use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use tiled_snapshot::{
    encode_png, FileAssetSource, Image, Map, MapError, PngFileSink, RasterSink, RenderOptions,
};

fn scratch_dir(tag: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("tiled_snapshot_{tag}_{nanos}"));
    fs::create_dir_all(dir.join("sets")).unwrap();
    dir
}

fn checker() -> Image {
    // 64x32: green tile then a tile with a magenta top half
    let mut bytes = Vec::with_capacity(64 * 32 * 4);
    for y in 0..32 {
        for x in 0..64 {
            let px: [u8; 4] = match (x < 32, y < 16) {
                (true, _) => [0, 200, 0, 255],
                (false, true) => [255, 0, 255, 255],
                (false, false) => [200, 200, 0, 255],
            };
            bytes.extend_from_slice(&px);
        }
    }
    Image {
        bytes,
        width: 64,
        height: 32,
    }
}

#[test]
fn integration_render_from_disk_with_external_tileset() {
    let dir = scratch_dir("disk");
    fs::write(dir.join("sets/terrain.png"), encode_png(&checker()).unwrap()).unwrap();
    fs::write(
        dir.join("sets/terrain.json"),
        r##"{"name": "terrain", "tilewidth": 32, "tileheight": 32,
            "tilecount": 2, "columns": 2, "image": "terrain.png",
            "transparentcolor": "#ff00ff"}"##,
    )
    .unwrap();
    fs::write(
        dir.join("world.json"),
        r##"{"orientation": "orthogonal", "width": 2, "height": 1,
            "tilewidth": 32, "tileheight": 32, "backgroundcolor": "#000000",
            "tilesets": [{"firstgid": 1, "source": "sets/terrain.json"}],
            "layers": [{"type": "tilelayer", "name": "ground",
                        "width": 2, "height": 1, "data": [1, 2]}]}"##,
    )
    .unwrap();

    let source = FileAssetSource::new();
    let map = Map::load(dir.join("world.json"), &source).unwrap();
    let out = dir.join("out/world.png");
    map.render_to(&source, &RenderOptions::default(), &mut PngFileSink::new(&out))
        .unwrap();

    let png = image::open(&out).unwrap().to_rgba8();
    assert_eq!(png.dimensions(), (64, 32));
    assert_eq!(png.get_pixel(5, 5).0, [0, 200, 0, 255]);
    // keyed out, background shows through
    assert_eq!(png.get_pixel(40, 5).0, [0, 0, 0, 255]);
    assert_eq!(png.get_pixel(40, 20).0, [200, 200, 0, 255]);

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn integration_missing_map_file_is_io_error() {
    let dir = scratch_dir("missing");
    let err = Map::load(dir.join("nope.json"), &FileAssetSource::new()).unwrap_err();
    assert!(matches!(err, MapError::Io { .. }));
    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn integration_memory_sink_receives_same_bytes_as_file() {
    let dir = scratch_dir("sink");
    fs::write(
        dir.join("empty.json"),
        r#"{"orientation": "orthogonal", "width": 1, "height": 1,
            "tilewidth": 32, "tileheight": 32, "tilesets": [],
            "layers": [{"type": "tilelayer", "name": "l", "width": 1, "height": 1, "data": [0]}]}"#,
    )
    .unwrap();
    let source = FileAssetSource::with_root(&dir);
    let map = Map::load(dir.join("empty.json"), &source).unwrap();

    let mut sink = tiled_snapshot::output::MemorySink::default();
    map.render_to(&source, &RenderOptions::default(), &mut sink)
        .unwrap();
    let mut file_sink = PngFileSink::new(dir.join("empty.png"));
    file_sink
        .store(&map.render(&source, &RenderOptions::default()).unwrap())
        .unwrap();

    assert_eq!(sink.encoded[0], fs::read(dir.join("empty.png")).unwrap());
    fs::remove_dir_all(&dir).unwrap();
}
