use chrono::NaiveDate;
use county_ingest_kernel::schema::TableName;
use county_ingest_kernel::store::{SqliteStore, Store};
use county_ingest_kernel::watermark::{read_watermark, Watermark};
use county_ingest_kernel::{Dataset, LoadCoordinator, LoadOptions, Row};

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2021, 1, day).unwrap()
}

fn erie(days: &[u32]) -> Dataset {
    days.iter()
        .map(|&day| Row {
            partition_key: "erie".into(),
            date_key: date(day),
            new_count: 10,
            cumulative_positive: 10 * day as u64,
            total_tests: 100,
            cumulative_tests: 100 * day as u64,
            load_timestamp: date(day),
        })
        .collect()
}

#[test]
fn erie_loads_incrementally_across_runs() {
    let dir = tempfile::tempdir().unwrap();
    let store =
        SqliteStore::open(dir.path().join("covid.db"), SqliteStore::DEFAULT_BUSY_TIMEOUT).unwrap();
    let coordinator = LoadCoordinator::new(store, LoadOptions::default());
    let table = TableName::for_partition("erie").unwrap();

    let first = coordinator.run_load(erie(&[1, 2, 3]));
    assert_eq!(first.rows_written, 3);

    let mut conn = coordinator.store().connect().unwrap();
    assert_eq!(read_watermark(&mut conn, &table).unwrap(), Watermark::At(date(3)));

    // 01-03 is already stored; only 01-04 is new.
    let second = coordinator.run_load(erie(&[3, 4]));
    assert_eq!(second.rows_written, 1);
    assert_eq!(coordinator.store().row_count(&table).unwrap(), 4);
    assert_eq!(read_watermark(&mut conn, &table).unwrap(), Watermark::At(date(4)));

    let third = coordinator.run_load(erie(&[3, 4]));
    assert_eq!(third.rows_written, 0);
    assert_eq!(coordinator.store().row_count(&table).unwrap(), 4);
}

#[test]
fn separate_databases_do_not_interfere() {
    let a = tempfile::tempdir().unwrap();
    let b = tempfile::tempdir().unwrap();
    let open = |dir: &tempfile::TempDir| {
        LoadCoordinator::new(
            SqliteStore::open(dir.path().join("covid.db"), SqliteStore::DEFAULT_BUSY_TIMEOUT)
                .unwrap(),
            LoadOptions::default(),
        )
    };
    let (first, second) = (open(&a), open(&b));

    assert_eq!(first.run_load(erie(&[1, 2])).rows_written, 2);
    assert_eq!(second.run_load(erie(&[1, 2])).rows_written, 2);
}
