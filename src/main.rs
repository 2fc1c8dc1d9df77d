use std::time::{Duration, Instant};

use actix::prelude::*;
use log::info;

use kungfu_chess::models::messages::{Join, RelayMessage};
use kungfu_chess::models::piece::Side;
use kungfu_chess::models::settings::GameSettings;
use kungfu_chess::room::{GameRoom, GetStatus};
use kungfu_chess::Timestamp;

/// Relay stand-in that prints everything the room would broadcast.
struct ConsoleRelay;

impl Actor for ConsoleRelay {
    type Context = Context<Self>;
}

impl Handler<RelayMessage> for ConsoleRelay {
    type Result = ();

    fn handle(&mut self, msg: RelayMessage, _: &mut Self::Context) {
        info!("relay <- {}", msg.0);
    }
}

#[actix_rt::main]
async fn main() {
    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    info!("starting a headless ai-vs-ai match");

    let mut room = GameRoom::new();
    let white = room.add_ai(Side::White).expect("fresh lobby");
    let settings = GameSettings {
        cooldown_secs: 2,
        max_moves_per_period: 6,
        random_spawns: true,
        hit_points: true,
    };
    room.machine_mut()
        .update_settings(white, settings, Timestamp::ZERO)
        .expect("settings are editable before the match starts");
    room.add_ai(Side::Black).expect("second seat free");

    let addr = room.start();
    let observer = ConsoleRelay.start();
    addr.send(Join {
        name: "observer".to_string(),
        recipient: observer.recipient(),
    })
    .await
    .expect("room mailbox alive")
    .expect("spectators may always join");

    // The demo is bounded like every other wait in the system.
    let deadline = Instant::now() + Duration::from_secs(180);
    loop {
        actix_rt::time::sleep(Duration::from_millis(500)).await;
        let status = addr.send(GetStatus).await.expect("room mailbox alive");
        if status.is_terminal() {
            info!("final status: {:?}", status);
            break;
        }
        if Instant::now() > deadline {
            info!("demo time limit reached, shutting down");
            break;
        }
    }
    System::current().stop();
}
