//! Save two linked objects to a JSON file, then load them into fresh
//! instances.
//!
//! Run with: `cargo run -p redlilium-persist --example save_and_load`

use redlilium_persist::{
    EntityHandle, Format, Node, ObjectHandle, PersistConfig, Persistable, Persistence, Ref,
    Shared, StoreError, Uid, shared,
};

#[derive(Debug, Default, Persistable)]
#[persist(tag = "demo::Door")]
struct Door {
    #[save]
    locked: bool,
    #[save]
    leads_to: Ref<Node>,
}

#[derive(Debug, Default, Persistable)]
#[persist(tag = "demo::Room")]
struct Room {
    #[save]
    title: String,
    #[save]
    items: Vec<String>,
}

const HALL: Uid = Uid::new(1);
const VAULT: Uid = Uid::new(2);

fn room(title: &str, items: &[&str]) -> Shared<Node> {
    shared(Node::new(title).with(Room {
        title: title.to_owned(),
        items: items.iter().map(|s| (*s).to_owned()).collect(),
    }))
}

fn main() -> Result<(), StoreError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = PersistConfig {
        save_path: std::env::temp_dir().join("redlilium-persist-demo.json"),
        format: Format::PrettyJson,
        ..PersistConfig::default()
    };

    // Save
    {
        let hall = room("hall", &["lamp"]);
        let vault = room("vault", &["gold", "map"]);
        hall.write().insert(EntityHandle::new(Door {
            locked: true,
            leads_to: Ref::new(vault.clone()),
        }));

        let mut session = Persistence::from_config(config.clone());
        session.register::<Door>().register::<Room>();
        session.track(ObjectHandle::from_shared(hall), HALL);
        session.track(ObjectHandle::from_shared(vault), VAULT);
        let report = session.on_save_requested()?;
        log::info!("save report: {} objects", report.objects);
    }

    // Load into fresh instances
    let hall = shared(Node::new("hall"));
    let vault = shared(Node::new("vault"));
    let mut session = Persistence::from_config(config);
    session.register::<Door>().register::<Room>();
    session.track(ObjectHandle::from_shared(hall.clone()), HALL);
    session.track(ObjectHandle::from_shared(vault.clone()), VAULT);
    let report = session.on_load_requested()?;
    for diagnostic in &report.diagnostics {
        log::warn!("{diagnostic}");
    }

    let hall = hall.read();
    if let Some(door) = hall.get::<Door>() {
        let door = door.read();
        let target = door.leads_to.get().map(|n| n.read().name().to_owned());
        log::info!("door locked={} leads to {target:?}", door.locked);
    }
    if let Some(room) = vault.read().get::<Room>() {
        log::info!("vault holds {:?}", room.read().items);
    }
    Ok(())
}
