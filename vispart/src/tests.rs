use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use num_complex::Complex32;
use rstest::rstest;
use vispart_error::VispartError;

use crate::dataset::{
    Dataset, DatasetScan, InputRecord, MemDataset, MemRow, RowMeta, Selection, SyntheticLayout,
};
use crate::source::{DatasetRecordSource, RecordSource};
use crate::{
    ChannelRange, Handle, PartitionOptions, PartitionPlan, Partitioner, Polarization, StoreMetrics,
};

const XX: Polarization = Polarization::XX;
const XY: Polarization = Polarization::XY;
const YX: Polarization = Polarization::YX;
const YY: Polarization = Polarization::YY;

fn c(re: f32, im: f32) -> Complex32 {
    Complex32::new(re, im)
}

/// A synthetic dataset whose weights are powers of two, so that weighting and unweighting a
/// value is exact.
fn dataset(dir: &Path, layout: SyntheticLayout) -> Arc<MemDataset> {
    let mut dataset = MemDataset::synthetic(dir.join("obs.ms"), &layout, 42).unwrap();
    for row in dataset.rows_mut() {
        for (i, weight) in row.weights.iter_mut().enumerate() {
            *weight = [0.5, 1.0, 2.0, 4.0][i % 4];
        }
    }
    Arc::new(dataset)
}

fn linear(channel_count: usize) -> SyntheticLayout {
    SyntheticLayout {
        channel_count,
        ..Default::default()
    }
}

fn partition(
    dataset: &Arc<MemDataset>,
    options: PartitionOptions,
    plan: &PartitionPlan,
) -> Result<Handle, VispartError> {
    Partitioner::new(options).partition(dataset.clone(), Arc::new(Selection::all()), plan)
}

fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn partition_then_commit_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let mem = dataset(
        dir.path(),
        SyntheticLayout {
            polarizations: vec![XX, YY],
            ..linear(8)
        },
    );
    mem.prepare_model_column().unwrap();
    let metrics = StoreMetrics::default();
    let handle = partition(
        &mem,
        PartitionOptions::default()
            .with_polarizations([XX, YY])
            .with_include_model(true)
            .with_initial_model_required(true)
            .with_metrics(metrics.clone()),
        &PartitionPlan::split(&[0], 8, 2).unwrap(),
    )
    .unwrap();
    assert!(!handle.commit_owed());

    let mut expected: Vec<Vec<Complex32>> = (0..mem.row_count())
        .map(|row| mem.model(row).unwrap())
        .collect();
    for shard in 0..handle.shard_count() {
        for (p, polarization) in [XX, YY].into_iter().enumerate() {
            let mut reader = handle.open(shard, polarization).unwrap();
            let range = reader.channel_range();
            for (record, row) in reader.dataset_rows().unwrap().into_iter().enumerate() {
                let values: Vec<_> = range
                    .channels()
                    .map(|channel| c(row as f32, (channel * 2 + p) as f32))
                    .collect();
                reader.write_model(record, &values).unwrap();
                for (channel, value) in range.channels().zip(values) {
                    expected[row][channel * 2 + p] = value;
                }
            }
        }
    }

    handle.commit().unwrap();
    for (row, cube) in expected.iter().enumerate() {
        assert_eq!(&mem.model(row).unwrap(), cube, "row {row}");
    }
    assert_eq!(metrics.unpartition_commits().count(), 1);

    handle.close().unwrap();
    assert_eq!(metrics.unpartition_commits().count(), 1);
    assert_eq!(metrics.cleanup_passes().count(), 1);
}

#[test]
fn weighted_model_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let mut dataset = MemDataset::new(dir.path().join("four.ms"), vec![XX], 4);
    for row in 0..4 {
        let meta = RowMeta {
            antenna1: 0,
            antenna2: 1,
            time: row as f64,
            ..Default::default()
        };
        let mut row_data = MemRow::constant(meta, 4, 1);
        if row == 2 {
            row_data.weights = vec![0.5, 2.0, 1.0, 1.0];
        }
        dataset.push_row(row_data).unwrap();
    }
    let mem = Arc::new(dataset);

    let handle = partition(
        &mem,
        PartitionOptions::default()
            .with_polarizations([XX])
            .with_include_model(true)
            .with_model_update_required(true),
        &PartitionPlan::new(vec![ChannelRange::new(0, 0..2), ChannelRange::new(0, 2..4)]).unwrap(),
    )
    .unwrap();
    assert!(handle.commit_owed());

    let mut shard = handle.open(0, XX).unwrap();
    shard.write_model(2, &[c(1.0, 1.0), c(2.0, 2.0)]).unwrap();
    let mut mapped = [Complex32::default(); 2];
    shard.read_model_row(2, &mut mapped).unwrap();
    assert_eq!(mapped, [c(0.5, 0.5), c(4.0, 4.0)]);

    shard.flush().unwrap();
    let model_path = handle.file_names().model_path(0, XX, 0);
    let bytes = fs::read(&model_path).unwrap();
    let mut on_disk = [Complex32::default(); 2];
    crate::sample::decode_slice(&bytes[2 * 2 * 8..], &mut on_disk);
    assert_eq!(on_disk, mapped);
    drop(shard);

    handle.close().unwrap();
    assert_eq!(mem.model(2).unwrap()[..2], [c(1.0, 1.0), c(2.0, 2.0)]);
    assert_eq!(mem.model(2).unwrap()[2..], [Complex32::default(); 2]);
    assert!(!model_path.exists());
    assert!(files_in(dir.path()).is_empty());
}

#[test]
fn zero_weight_keeps_existing_model() {
    let dir = tempfile::tempdir().unwrap();
    let mut dataset = MemDataset::new(dir.path().join("zero.ms"), vec![XX], 2);
    let mut row = MemRow::constant(RowMeta::default(), 2, 1);
    row.weights = vec![0.0, 1.0];
    dataset.push_row(row).unwrap();
    dataset.set_model(vec![vec![c(7.0, 7.0); 2]]).unwrap();
    let mem = Arc::new(dataset);

    let handle = partition(
        &mem,
        PartitionOptions::default()
            .with_polarizations([XX])
            .with_include_model(true)
            .with_model_update_required(true),
        &PartitionPlan::split(&[0], 2, 1).unwrap(),
    )
    .unwrap();
    let mut shard = handle.open(0, XX).unwrap();
    shard.write_model(0, &[c(1.0, 1.0), c(2.0, 2.0)]).unwrap();
    drop(shard);
    handle.close().unwrap();

    assert_eq!(mem.model(0).unwrap(), vec![c(7.0, 7.0), c(2.0, 2.0)]);
}

#[test]
fn explicit_commit_rearms_on_write() {
    let dir = tempfile::tempdir().unwrap();
    let mem = dataset(dir.path(), linear(4));
    let metrics = StoreMetrics::default();
    let handle = partition(
        &mem,
        PartitionOptions::default()
            .with_polarizations([XX])
            .with_include_model(true)
            .with_model_update_required(true)
            .with_metrics(metrics.clone()),
        &PartitionPlan::split(&[0], 4, 1).unwrap(),
    )
    .unwrap();

    let mut shard = handle.open(0, XX).unwrap();
    let row = shard.dataset_rows().unwrap()[0];
    shard.write_model(0, &[c(1.0, 0.0); 4]).unwrap();
    handle.commit().unwrap();
    assert!(!handle.commit_pending());
    assert_eq!(mem.model(row).unwrap()[0], c(1.0, 0.0));

    shard.write_model(0, &[c(3.0, 0.0); 4]).unwrap();
    assert!(handle.commit_pending());
    drop(shard);
    handle.close().unwrap();

    assert_eq!(metrics.unpartition_commits().count(), 2);
    let cube = mem.model(row).unwrap();
    for channel in 0..4 {
        assert_eq!(cube[channel * 4], c(3.0, 0.0));
    }
}

#[test]
fn row_counts_match_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let mem = dataset(
        dir.path(),
        SyntheticLayout {
            band_ids: vec![3, 0],
            ..linear(6)
        },
    );
    let selection = Selection::all().with_antennas([0, 1, 2]);
    let plan = PartitionPlan::split(&[0, 3], 6, 2).unwrap();
    let handle = Partitioner::new(PartitionOptions::default().with_polarizations([XX, YY]))
        .partition(mem.clone(), Arc::new(selection), &plan)
        .unwrap();

    for (shard, range) in handle.channel_ranges().iter().enumerate() {
        for &polarization in handle.polarizations() {
            let mut reader = handle.open(shard, polarization).unwrap();
            let mut rows = 0;
            while reader.current_row_available() {
                let meta = reader.read_meta().unwrap();
                assert_eq!(meta.band_id, range.band_id);
                assert!(meta.antenna1 < 3 && meta.antenna2 < 3);
                reader.next_row().unwrap();
                rows += 1;
            }
            // Three baselines among antennas 0..3, for three timesteps.
            assert_eq!(rows, 9);
            assert_eq!(reader.meta_header().selected_record_count, 9);
            assert_eq!(reader.row_count(), 9);
            assert!(reader.read_meta().is_err());
        }
    }
    handle.close().unwrap();
}

#[test]
fn peeking_does_not_advance() {
    let dir = tempfile::tempdir().unwrap();
    let mem = dataset(dir.path(), linear(4));
    let handle = partition(
        &mem,
        PartitionOptions::default().with_polarizations([XY]),
        &PartitionPlan::split(&[0], 4, 1).unwrap(),
    )
    .unwrap();
    let mut reader = handle.open(0, XY).unwrap();
    let stride = reader.row_stride();

    let mut all_rows = Vec::new();
    while reader.current_row_available() {
        let mut first = vec![Complex32::default(); stride];
        let mut second = vec![Complex32::default(); stride];
        reader.read_data(&mut first).unwrap();
        reader.read_data(&mut second).unwrap();
        assert_eq!(first, second);
        all_rows.push(first);
        reader.next_row().unwrap();
    }

    // Reading only some fields on some rows keeps the cursors aligned.
    reader.reset().unwrap();
    let mut weights = vec![0.0; stride];
    for (row, expected) in all_rows.iter().enumerate() {
        if row % 2 == 0 {
            let mut data = vec![Complex32::default(); stride];
            reader.read_data(&mut data).unwrap();
            assert_eq!(&data, expected);
        } else {
            reader.read_weights(&mut weights).unwrap();
            reader.read_meta().unwrap();
        }
        reader.next_row().unwrap();
    }
    assert!(!reader.current_row_available());
}

#[test]
fn shard_data_is_weighted() {
    let dir = tempfile::tempdir().unwrap();
    let mem = dataset(dir.path(), linear(4));
    let handle = partition(
        &mem,
        PartitionOptions::default().with_polarizations([Polarization::StokesI, Polarization::Instrumental]),
        &PartitionPlan::new(vec![ChannelRange::new(0, 1..3)]).unwrap(),
    )
    .unwrap();

    let source = &mem.rows()[0];
    let weighted = |i: usize| source.data[i] * source.weights[i];

    let mut stokes = handle.open(0, Polarization::StokesI).unwrap();
    assert_eq!(stokes.row_stride(), 2);
    let mut data = vec![Complex32::default(); 2];
    let mut weights = vec![0.0; 2];
    stokes.read_data(&mut data).unwrap();
    stokes.read_weights(&mut weights).unwrap();
    for (out, channel) in (1..3).enumerate() {
        assert_eq!(data[out], weighted(channel * 4) + weighted(channel * 4 + 3));
        assert_eq!(
            weights[out],
            source.weights[channel * 4] + source.weights[channel * 4 + 3]
        );
    }

    let mut instrumental = handle.open(0, Polarization::Instrumental).unwrap();
    assert_eq!(instrumental.row_stride(), 8);
    let mut data = vec![Complex32::default(); 8];
    instrumental.read_data(&mut data).unwrap();
    let expected: Vec<_> = (4..12).map(weighted).collect();
    assert_eq!(data, expected);
}

#[test]
fn non_finite_values_do_not_clobber() {
    let dir = tempfile::tempdir().unwrap();
    let mem = dataset(dir.path(), linear(2));
    let handle = partition(
        &mem,
        PartitionOptions::default()
            .with_polarizations([XX])
            .with_include_model(true),
        &PartitionPlan::split(&[0], 2, 1).unwrap(),
    )
    .unwrap();

    let mut reader = handle.open(0, XX).unwrap();
    let nan = c(f32::NAN, f32::NAN);
    reader.write_model(1, &[c(1.0, 0.0), nan]).unwrap();
    reader.write_model(1, &[nan, c(0.0, 1.0)]).unwrap();

    // Channel 0 and 1 of XX are cube indices 0 and 4, with weights 0.5 and 0.5.
    let mut model = [Complex32::default(); 2];
    reader.read_model_row(1, &mut model).unwrap();
    assert_eq!(model, [c(0.5, 0.0), c(0.0, 0.5)]);
}

#[test]
fn last_release_commits_once() {
    let dir = tempfile::tempdir().unwrap();
    let mem = dataset(dir.path(), linear(4));
    let metrics = StoreMetrics::default();
    let handle = partition(
        &mem,
        PartitionOptions::default()
            .with_polarizations([XX])
            .with_include_model(true)
            .with_model_update_required(true)
            .with_metrics(metrics.clone()),
        &PartitionPlan::split(&[0], 4, 2).unwrap(),
    )
    .unwrap();

    let clones: Vec<Handle> = (0..4).map(|_| handle.clone()).collect();
    assert_eq!(handle.ref_count(), 5);
    drop(handle);

    thread::scope(|scope| {
        for clone in clones {
            scope.spawn(move || drop(clone));
        }
    });

    assert_eq!(metrics.unpartition_commits().count(), 1);
    assert_eq!(metrics.cleanup_passes().count(), 1);
    assert_eq!(mem.model_write_count(), mem.row_count());
    assert!(files_in(dir.path()).is_empty());
}

#[test]
fn close_reports_only_on_last_holder() {
    let dir = tempfile::tempdir().unwrap();
    let mem = dataset(dir.path(), linear(4));
    let metrics = StoreMetrics::default();
    let handle = partition(
        &mem,
        PartitionOptions::default()
            .with_polarizations([XX])
            .with_metrics(metrics.clone()),
        &PartitionPlan::split(&[0], 4, 1).unwrap(),
    )
    .unwrap();

    let reader = handle.open(0, XX).unwrap();
    handle.close().unwrap();
    assert_eq!(metrics.cleanup_passes().count(), 0);
    assert!(!files_in(dir.path()).is_empty());

    // The reader holds the last reference.
    assert_eq!(reader.handle().ref_count(), 1);
    drop(reader);
    assert_eq!(metrics.cleanup_passes().count(), 1);
    assert_eq!(metrics.unpartition_commits().count(), 0);
    assert!(files_in(dir.path()).is_empty());
}

#[test]
fn concurrent_writers_on_disjoint_shards() {
    let dir = tempfile::tempdir().unwrap();
    let mem = dataset(
        dir.path(),
        SyntheticLayout {
            polarizations: vec![XX, YY],
            timestep_count: 4,
            ..linear(12)
        },
    );
    let handle = partition(
        &mem,
        PartitionOptions::default()
            .with_polarizations([XX, YY])
            .with_include_model(true)
            .with_model_update_required(true),
        &PartitionPlan::split(&[0], 12, 3).unwrap(),
    )
    .unwrap();

    thread::scope(|scope| {
        for shard in 0..handle.shard_count() {
            for polarization in [XX, YY] {
                let handle = handle.clone();
                scope.spawn(move || {
                    let mut reader = handle.open(shard, polarization).unwrap();
                    let range = reader.channel_range();
                    let p = polarization.index_in(&[XX, YY]).unwrap();
                    for record in 0..reader.row_count() {
                        let values: Vec<_> = range
                            .channels()
                            .map(|channel| c(record as f32, (channel * 2 + p) as f32))
                            .collect();
                        reader.write_model(record, &values).unwrap();
                    }
                });
            }
        }
    });

    handle.close().unwrap();
    for row in 0..mem.row_count() {
        let model = mem.model(row).unwrap();
        for (index, value) in model.iter().enumerate() {
            assert_eq!(*value, c(row as f32, index as f32));
        }
    }
}

#[test]
fn stokes_i_commit_sets_both_parallel_hands() {
    let dir = tempfile::tempdir().unwrap();
    let mem = dataset(dir.path(), linear(2));
    let handle = partition(
        &mem,
        PartitionOptions::default()
            .with_include_model(true)
            .with_model_update_required(true),
        &PartitionPlan::split(&[0], 2, 1).unwrap(),
    )
    .unwrap();

    let mut reader = handle.open(0, Polarization::StokesI).unwrap();
    for record in 0..reader.row_count() {
        reader.write_model(record, &[c(3.0, 1.0), c(-1.0, 0.5)]).unwrap();
    }
    drop(reader);
    handle.close().unwrap();

    let model = mem.model(0).unwrap();
    assert_eq!(
        model,
        vec![
            c(3.0, 1.0),
            Complex32::default(),
            Complex32::default(),
            c(3.0, 1.0),
            c(-1.0, 0.5),
            Complex32::default(),
            Complex32::default(),
            c(-1.0, 0.5),
        ]
    );
}

#[test]
fn truncated_model_is_a_shape_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    let mem = dataset(dir.path(), linear(4));
    let handle = partition(
        &mem,
        PartitionOptions::default()
            .with_polarizations([YY])
            .with_include_model(true)
            .with_model_update_required(true),
        &PartitionPlan::split(&[0], 4, 2).unwrap(),
    )
    .unwrap();

    let model_path = handle.file_names().model_path(1, YY, 0);
    let file = OpenOptions::new().write(true).open(&model_path).unwrap();
    let len = file.metadata().unwrap().len();
    file.set_len(len - 8).unwrap();
    drop(file);

    assert!(matches!(
        handle.open(1, YY),
        Err(VispartError::ShapeMismatch(..))
    ));
    assert!(handle.open(0, YY).is_ok());
    assert!(matches!(
        handle.close(),
        Err(VispartError::ShapeMismatch(..))
    ));
    // Cleanup still runs after a failed commit.
    assert!(files_in(dir.path()).is_empty());
    assert_eq!(mem.model_write_count(), 0);
}

#[rstest]
#[case::stokes_from_one_hand(vec![XX], Polarization::StokesI)]
#[case::circular_from_linear(vec![XX, XY, YX, YY], Polarization::RR)]
#[case::stokes_v_without_cross_hands(vec![XX, YY], Polarization::StokesV)]
fn missing_correlations_are_rejected(
    #[case] native: Vec<Polarization>,
    #[case] requested: Polarization,
) {
    let dir = tempfile::tempdir().unwrap();
    let mem = dataset(
        dir.path(),
        SyntheticLayout {
            polarizations: native,
            ..linear(2)
        },
    );
    let result = partition(
        &mem,
        PartitionOptions::default().with_polarizations([requested]),
        &PartitionPlan::split(&[0], 2, 1).unwrap(),
    );
    assert!(matches!(result, Err(VispartError::Configuration(..))));
    assert!(files_in(dir.path()).is_empty());
}

#[test]
fn failed_partition_removes_its_files() {
    let dir = tempfile::tempdir().unwrap();
    // No model column, but the initial model is required.
    let mem = dataset(dir.path(), linear(4));
    let result = partition(
        &mem,
        PartitionOptions::default()
            .with_polarizations([XX, YY])
            .with_initial_model_required(true),
        &PartitionPlan::split(&[0], 4, 2).unwrap(),
    );
    assert!(matches!(result, Err(VispartError::InvalidState(..))));
    assert!(files_in(dir.path()).is_empty());
}

#[test]
fn temporary_directory_holds_the_shards() {
    let dataset_dir = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let mem = dataset(dataset_dir.path(), linear(4));
    let handle = partition(
        &mem,
        PartitionOptions::default()
            .with_polarizations([XX])
            .with_include_model(true)
            .with_temporary_directory(scratch.path()),
        &PartitionPlan::split(&[0], 4, 2).unwrap(),
    )
    .unwrap();

    assert!(files_in(dataset_dir.path()).is_empty());
    assert_eq!(
        files_in(scratch.path()),
        vec![
            "obs.ms-part0000-XX-b0.data",
            "obs.ms-part0000-XX-b0.model.data",
            "obs.ms-part0000-XX-b0.weight.data",
            "obs.ms-part0001-XX-b0.data",
            "obs.ms-part0001-XX-b0.model.data",
            "obs.ms-part0001-XX-b0.weight.data",
            "obs.ms-spw0-meta.data",
        ]
    );
    let reader = handle.open(1, XX).unwrap();
    assert_eq!(reader.source_path(), mem.path().to_string_lossy());
    assert_eq!(reader.part_header().channel_start, 2);
    drop(reader);

    handle.close().unwrap();
    assert!(files_in(scratch.path()).is_empty());
}

#[test]
fn interval_selection_maps_rows() {
    let dir = tempfile::tempdir().unwrap();
    let mem = dataset(dir.path(), linear(2));
    let handle = Partitioner::new(PartitionOptions::default().with_polarizations([XX]))
        .partition(
            mem.clone(),
            Arc::new(Selection::all().with_interval(1..2)),
            &PartitionPlan::split(&[0], 2, 1).unwrap(),
        )
        .unwrap();

    let reader = handle.open(0, XX).unwrap();
    // Six baselines per timestep; the second timestep holds rows 6..12.
    assert_eq!(reader.dataset_rows().unwrap(), (6..12).collect::<Vec<_>>());
    assert_eq!(reader.row_count(), 6);
}

#[test]
fn simulated_noise_keeps_weights() {
    let dir = tempfile::tempdir().unwrap();
    let mem = dataset(dir.path(), linear(2));
    let plan = PartitionPlan::split(&[0], 2, 1).unwrap();
    let handle = partition(
        &mem,
        PartitionOptions::default()
            .with_polarizations([XX])
            .with_simulated_noise(1.0),
        &plan,
    )
    .unwrap();

    let mut reader = handle.open(0, XX).unwrap();
    let mut data = [Complex32::default(); 2];
    let mut weights = [0.0; 2];
    reader.read_data(&mut data).unwrap();
    reader.read_weights(&mut weights).unwrap();
    let source = &mem.rows()[0];
    assert_eq!(weights, [source.weights[0], source.weights[4]]);
    assert_ne!(data[0], source.data[0] * source.weights[0]);
}

#[test]
fn open_rejects_unknown_shards() {
    let dir = tempfile::tempdir().unwrap();
    let mem = dataset(dir.path(), linear(2));
    let handle = partition(
        &mem,
        PartitionOptions::default().with_polarizations([XX]),
        &PartitionPlan::split(&[0], 2, 1).unwrap(),
    )
    .unwrap();
    assert!(matches!(
        handle.open(1, XX),
        Err(VispartError::OutOfBounds(1, 0, 1, _))
    ));
    assert!(handle.open(0, YX).is_err());
    let mut reader = handle.open(0, XX).unwrap();
    assert!(matches!(
        reader.write_model(0, &[Complex32::default(); 2]),
        Err(VispartError::InvalidState(..))
    ));
    assert!(handle.commit().is_err());
}

/// Passes records through while counting reads and progress queries, reporting `polarizations`
/// as its correlations.
struct CountingSource {
    inner: DatasetRecordSource,
    polarizations: Vec<Polarization>,
    reads: Arc<AtomicUsize>,
    progress_queries: Arc<AtomicUsize>,
}

impl CountingSource {
    fn new(mem: &Arc<MemDataset>, polarizations: Vec<Polarization>) -> Self {
        let scan = DatasetScan::new(mem.clone(), Arc::new(Selection::all()), [0]);
        Self {
            inner: DatasetRecordSource::new(scan, false).unwrap(),
            polarizations,
            reads: Arc::new(AtomicUsize::new(0)),
            progress_queries: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl RecordSource for CountingSource {
    fn at_end(&self) -> bool {
        self.inner.at_end()
    }

    fn read_next(&mut self) -> Result<InputRecord, VispartError> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.inner.read_next()
    }

    fn current_progress(&self) -> usize {
        self.progress_queries.fetch_add(1, Ordering::Relaxed);
        self.inner.current_progress()
    }

    fn total_progress(&self) -> usize {
        self.inner.total_progress()
    }

    fn polarizations(&self) -> &[Polarization] {
        &self.polarizations
    }

    fn channel_count(&self) -> usize {
        self.inner.channel_count()
    }

    fn start_time(&self) -> f64 {
        self.inner.start_time()
    }

    fn source_path(&self) -> &Path {
        self.inner.source_path()
    }
}

#[test]
fn partition_pulls_from_the_given_source() {
    let dir = tempfile::tempdir().unwrap();
    let mem = dataset(dir.path(), linear(4));
    let source = CountingSource::new(&mem, mem.polarizations().to_vec());
    let reads = source.reads.clone();
    let progress_queries = source.progress_queries.clone();

    let handle = Partitioner::new(
        PartitionOptions::default()
            .with_polarizations([XX])
            .with_progress(true),
    )
    .partition_source(
        source,
        mem.clone(),
        Arc::new(Selection::all()),
        &PartitionPlan::split(&[0], 4, 2).unwrap(),
    )
    .unwrap();

    assert_eq!(reads.load(Ordering::Relaxed), mem.row_count());
    assert_eq!(progress_queries.load(Ordering::Relaxed), mem.row_count());
    let reader = handle.open(1, XX).unwrap();
    assert_eq!(reader.row_count(), mem.row_count());
    assert_eq!(reader.source_path(), mem.path().to_string_lossy());
}

#[test]
fn source_correlations_must_match_dataset() {
    let dir = tempfile::tempdir().unwrap();
    let mem = dataset(dir.path(), linear(4));
    let source = CountingSource::new(&mem, vec![XX, YY]);
    let reads = source.reads.clone();

    let result = Partitioner::new(PartitionOptions::default().with_polarizations([XX]))
        .partition_source(
            source,
            mem.clone(),
            Arc::new(Selection::all()),
            &PartitionPlan::split(&[0], 4, 1).unwrap(),
        );
    assert!(matches!(result, Err(VispartError::Configuration(..))));
    assert_eq!(reads.load(Ordering::Relaxed), 0);
    assert!(files_in(dir.path()).is_empty());
}
