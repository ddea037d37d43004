use docmap::doc;
use docmap::errors::DocmapResult;
use docmap_int_test::test_util::{author_ref, create_test_mapper};

fn main() -> DocmapResult<()> {
    println!("Starting stress test...");
    let (mapper, persister) = create_test_mapper();

    let count = 100_000i64;
    let session = mapper.session()?;
    let uow = session.begin_unit_of_work()?;

    let start = std::time::Instant::now();
    for id in 0..count {
        uow.register_new(
            "Author",
            doc! {
                "id" => id,
                "name" => uuid::Uuid::new_v4().to_string(),
            },
        )?;
    }
    let report = uow.commit()?;
    println!(
        "Inserted {} entities in {:?}",
        report.applied().len(),
        start.elapsed()
    );

    let start = std::time::Instant::now();
    for id in 0..count {
        let entity = uow.find(&author_ref(id)).expect("entity is managed");
        entity.set("name", format!("renamed-{}", id))?;
    }
    let report = uow.commit()?;
    println!(
        "Updated {} entities in {:?}",
        report.applied().len(),
        start.elapsed()
    );

    let start = std::time::Instant::now();
    for id in 0..count {
        uow.schedule_remove(&author_ref(id))?;
    }
    let report = uow.commit()?;
    println!(
        "Deleted {} entities in {:?}",
        report.applied().len(),
        start.elapsed()
    );

    assert!(persister.is_empty());
    mapper.close()
}
