use std::fs;
use std::path::Path;

use criterion::{criterion_group, criterion_main, Criterion};

use rflayout::resources::{
    QualifierSet, ResourceConfigurationGraph, ResourceFolder, ResourceKey, ResourceRepository, ResourceTier,
};
use rflayout::{DeviceProfile, EnvironmentContext, EnvironmentOptions, Sandbox, ScriptedEngine, VirtualClock};

fn bench_clock_drain(c: &mut Criterion) {
    c.bench_function("clock_drain_1000", |b| {
        b.iter(|| {
            let mut clock = VirtualClock::default();
            for i in 0..1000u64 {
                clock.post_at(i % 97, |_| {});
            }
            clock.drain(100).unwrap()
        })
    });
}

fn bench_resource_configure(c: &mut Criterion) {
    let mut graph = ResourceConfigurationGraph::new();
    for (tier, name) in [
        (ResourceTier::Framework, "android"),
        (ResourceTier::Library, "lib"),
        (ResourceTier::Local, "app"),
    ] {
        let mut values = ResourceFolder::for_dir_name("values");
        let mut night = ResourceFolder::for_dir_name("values-night-v29");
        for i in 0..500 {
            values = values.with_value(ResourceKey::string(format!("s{}", i)), format!("{}-{}", name, i));
            night = night.with_value(ResourceKey::string(format!("s{}", i)), format!("{}-night-{}", name, i));
        }
        graph.add(tier, ResourceRepository::new(name, vec![values, night]));
    }
    let qualifiers: QualifierSet = DeviceProfile::pixel_5().with_night_mode(true).qualifiers(31);

    c.bench_function("resource_graph_configured", |b| {
        b.iter(|| graph.configured(&qualifiers).len())
    });
}

fn write(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn bench_render(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let sdk = dir.path().join("sdk");
    let app = dir.path().join("app");
    write(
        &sdk.join("platforms/android-31/data/res/values/values.xml"),
        r#"<resources><string name="ok">OK</string></resources>"#,
    );
    write(
        &app.join("res/values/strings.xml"),
        r#"<resources><string name="app_name">Bench</string></resources>"#,
    );

    let env = EnvironmentContext::build(EnvironmentOptions::new(&app, &sdk)).unwrap();
    let mut sandbox = Sandbox::new(&env, ScriptedEngine::new()).unwrap();
    let config = sandbox
        .session_builder()
        .with_device(DeviceProfile::pixel_5().with_size(360, 640))
        .build()
        .unwrap();

    c.bench_function("sandbox_render_360x640", |b| {
        b.iter(|| sandbox.render(&config).unwrap().image.digest())
    });
}

criterion_group!(benches, bench_clock_drain, bench_resource_configure, bench_render);
criterion_main!(benches);
