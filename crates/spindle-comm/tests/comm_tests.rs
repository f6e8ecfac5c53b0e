//! Integration tests for spindle-comm.

use spindle_comm::{Communicator, Partition, SerialComm};
use spindle_types::SpindleError;

// ─── Partition Tests ──────────────────────────────────────────

#[test]
fn partition_from_counts() {
    let p = Partition::from_counts(vec![3, 5, 2]);
    assert_eq!(p.ranks(), 3);
    assert_eq!(p.total(), 10);
    assert_eq!(p.displ_of(0), 0);
    assert_eq!(p.displ_of(1), 3);
    assert_eq!(p.displ_of(2), 8);
    assert_eq!(p.range_of(1), 3..8);
}

#[test]
fn partition_split_evenly_spreads_remainder() {
    let p = Partition::split_evenly(10, 3);
    assert_eq!(p.count_of(0), 4);
    assert_eq!(p.count_of(1), 3);
    assert_eq!(p.count_of(2), 3);
    assert_eq!(p.total(), 10);
}

#[test]
fn partition_scaled_by_stride() {
    let p = Partition::split_evenly(7, 2).scaled(3);
    assert_eq!(p.count_of(0), 12);
    assert_eq!(p.count_of(1), 9);
    assert_eq!(p.total(), 21);
}

#[test]
fn partition_validation_mismatch_is_precompute_error() {
    let p = Partition::from_counts(vec![6]);
    assert!(p.validate_local_rows(0, 6).is_ok());

    let err = p.validate_local_rows(0, 9).unwrap_err();
    assert!(matches!(err, SpindleError::Precompute(_)), "got {err:?}");

    let err = p.validate_local_rows(3, 6).unwrap_err();
    assert!(matches!(err, SpindleError::Precompute(_)), "got {err:?}");
}

// ─── SerialComm Tests ─────────────────────────────────────────

#[test]
fn serial_comm_is_rank_zero_of_one() {
    let comm = SerialComm::new();
    assert_eq!(comm.rank(), 0);
    assert_eq!(comm.size(), 1);
}

#[test]
fn serial_collectives_are_identity() {
    let comm = SerialComm::new();
    let data = vec![1.0, 2.0, 3.0];

    let gathered = comm.gather(&data, 0).unwrap();
    assert_eq!(gathered, Some(data.clone()));

    let p = Partition::from_counts(vec![3]);
    let all = comm.allgatherv(&data, &p).unwrap();
    assert_eq!(all, data);

    let summed = comm.allreduce_sum(&data).unwrap();
    assert_eq!(summed, data);

    let mut buf = data.clone();
    comm.broadcast(&mut buf, 0).unwrap();
    assert_eq!(buf, data);
}

#[test]
fn serial_comm_rejects_foreign_root() {
    let comm = SerialComm::new();
    assert!(comm.gather(&[1.0], 1).is_err());
    assert!(comm.broadcast(&mut vec![1.0], 2).is_err());
}

#[test]
fn serial_allgatherv_checks_partition() {
    let comm = SerialComm::new();
    let p = Partition::from_counts(vec![4]);
    assert!(comm.allgatherv(&[1.0, 2.0], &p).is_err());
}
