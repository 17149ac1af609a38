use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use sbi_irc::IrcEngine;
use sbi_irc::config::{EngineConfig, NetworkConfig, ProfileConfig};
use sbi_irc::parser::process_line;

// Dispatch cost of typical channel traffic through the full handler path,
// state updates included. No listeners are registered.

fn joined_engine() -> (std::sync::Arc<IrcEngine>, std::sync::Arc<sbi_irc::IrcConnection>) {
    let engine = IrcEngine::new(EngineConfig::default());
    let profile = ProfileConfig {
        profile_name: "bench".into(),
        nicknames: vec!["trez".into()],
        ..ProfileConfig::default()
    };
    let network = NetworkConfig {
        network_name: "Bench".into(),
        profile_name: "bench".into(),
        ..NetworkConfig::default()
    };
    engine.create_configured_network(&network, &profile).unwrap();
    engine.get_network("Bench").unwrap().set_nickname("trez");
    let conn = engine.create_connection("Bench").unwrap();

    for line in [
        ":irc.example.org 001 trez :Welcome",
        ":irc.example.org 005 trez CHANTYPES=# PREFIX=(ov)@+ CHANMODES=beI,k,l,imnpst :are supported",
        ":trez!tirc@bench JOIN :#bench",
        ":irc.example.org 353 trez = #bench :@op1 +voice1 plain1 alice bob",
        ":irc.example.org 366 trez #bench :End of /NAMES list.",
    ] {
        process_line(&engine, &conn, line).unwrap();
    }
    (engine, conn)
}

fn dispatch_benchmark(c: &mut Criterion) {
    let (engine, conn) = joined_engine();
    let mut group = c.benchmark_group("dispatch");
    group.throughput(Throughput::Elements(1));

    group.bench_function("channel_privmsg", |b| {
        b.iter(|| process_line(&engine, &conn, ":alice!a@example.net PRIVMSG #bench :Hello world").unwrap())
    });

    group.bench_function("channel_mode", |b| {
        b.iter(|| process_line(&engine, &conn, ":op1!o@example.net MODE #bench +o-v plain1 voice1").unwrap())
    });

    group.bench_function("names_burst", |b| {
        b.iter(|| {
            process_line(&engine, &conn, ":irc.example.org 353 trez = #bench :@op1 +voice1 plain1 alice bob").unwrap();
            process_line(&engine, &conn, ":irc.example.org 366 trez #bench :End of /NAMES list.").unwrap();
            engine.pools().reclaim()
        })
    });

    group.finish();
}

criterion_group!(benches, dispatch_benchmark);
criterion_main!(benches);
