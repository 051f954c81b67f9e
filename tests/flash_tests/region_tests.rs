//! Tests for RegionDriver
//!
//! These tests verify:
//! - Program session round-trip and header contents
//! - Capacity boundary
//! - Session ordering and re-entrancy rejection
//! - Hardware faults abandoning the session
//! - Cache barriers around erase/program
//! - Integrity detection after corruption or a torn finalize

use flashstore::checksum;
use flashstore::flash::{Barrier, RamFlash, RegionDriver, SessionState, HEADER_SIZE};
use flashstore::{Status, StoreError};

// =============================================================================
// Helper Functions
// =============================================================================

/// 1024-byte payload capacity
fn setup_driver() -> RegionDriver<RamFlash> {
    RegionDriver::new(RamFlash::new(1024 + HEADER_SIZE, 8, 1)).unwrap()
}

fn setup_driver_with_write_size(write_size: usize) -> RegionDriver<RamFlash> {
    RegionDriver::new(RamFlash::new(512, 64, write_size)).unwrap()
}

fn write_image(driver: &mut RegionDriver<RamFlash>, payload: &[u8]) {
    driver.begin_program().unwrap();
    driver.program(payload).unwrap();
    driver.end_program().unwrap();
}

// =============================================================================
// Fresh Region Tests
// =============================================================================

#[test]
fn test_fresh_region_reads_erased() {
    let driver = setup_driver();

    assert!(driver.is_erased());
    assert_eq!(driver.capacity(), 1024);
    assert_eq!(driver.data_size(), 0);
    assert!(driver.data().is_empty());
    assert_eq!(driver.state(), SessionState::Idle);
    assert!(driver.image().unwrap().is_none());
}

#[test]
fn test_verify_on_erased_region_is_integrity_error() {
    let driver = setup_driver();

    assert!(matches!(driver.verify(), Err(StoreError::Integrity(_))));
}

#[test]
fn test_invalid_geometry_rejected() {
    assert!(RegionDriver::new(RamFlash::new(8, 8, 1)).is_err());
    assert!(RegionDriver::new(RamFlash::new(100, 64, 1)).is_err());
    assert!(RegionDriver::new(RamFlash::new(128, 64, 3)).is_err());
    assert!(RegionDriver::new(RamFlash::new(128, 64, 8)).is_err());
}

#[test]
fn test_size_not_multiple_of_write_size_rejected() {
    // 1002 bytes leaves a 994-byte payload whose padded tail would overrun
    let result = RegionDriver::new(RamFlash::new(1002, 1002, 4));
    assert!(matches!(result, Err(StoreError::Config(_))));

    let result = RegionDriver::new(RamFlash::new(1002, 1002, 2));
    assert!(result.is_ok());
}

// =============================================================================
// Round-Trip Tests
// =============================================================================

#[test]
fn test_hundred_byte_ascii_payload() {
    let mut driver = setup_driver();
    let payload: Vec<u8> = (0..100).map(|i| b'a' + (i % 26) as u8).collect();

    write_image(&mut driver, &payload);

    let sum = payload.iter().fold(0u32, |acc, &b| acc.wrapping_add(b as u32));
    assert_eq!(driver.data_size(), 100);
    assert_eq!(driver.checksum(), sum.wrapping_neg());
    assert_eq!(driver.data(), payload.as_slice());
    assert!(checksum::verify(driver.data(), driver.checksum()));
    driver.verify().unwrap();
}

#[test]
fn test_multiple_program_calls_concatenate() {
    let mut driver = setup_driver();

    driver.begin_program().unwrap();
    driver.program(b"hello, ").unwrap();
    assert_eq!(driver.cursor(), Some(7));
    driver.program(b"flash").unwrap();
    assert_eq!(driver.cursor(), Some(12));
    driver.end_program().unwrap();

    assert_eq!(driver.data(), b"hello, flash");
    assert_eq!(driver.image().unwrap(), Some(&b"hello, flash"[..]));
}

#[test]
fn test_unaligned_programs_with_word_writes() {
    let mut driver = setup_driver_with_write_size(4);
    let payload: Vec<u8> = (0u8..=22).collect();

    driver.begin_program().unwrap();
    for chunk in [&payload[..3], &payload[3..8], &payload[8..9], &payload[9..]] {
        driver.program(chunk).unwrap();
    }
    driver.end_program().unwrap();

    assert_eq!(driver.data_size(), 23);
    assert_eq!(driver.data(), payload.as_slice());
    driver.verify().unwrap();
}

#[test]
fn test_half_word_writes_round_trip() {
    let mut driver = setup_driver_with_write_size(2);

    write_image(&mut driver, b"odd");

    assert_eq!(driver.data(), b"odd");
    driver.verify().unwrap();
}

#[test]
fn test_empty_session_is_valid_empty_image() {
    let mut driver = setup_driver();

    driver.begin_program().unwrap();
    driver.end_program().unwrap();

    assert!(!driver.is_erased());
    assert_eq!(driver.data_size(), 0);
    assert_eq!(driver.checksum(), 0);
    assert_eq!(driver.image().unwrap(), Some(&[][..]));
}

#[test]
fn test_new_session_replaces_old_image() {
    let mut driver = setup_driver();

    write_image(&mut driver, b"first image, longer");
    write_image(&mut driver, b"second");

    assert_eq!(driver.data(), b"second");
    driver.verify().unwrap();
}

#[test]
fn test_image_survives_driver_restart() {
    let mut driver = setup_driver();
    write_image(&mut driver, b"saved program");

    let driver = RegionDriver::new(driver.into_device()).unwrap();

    assert_eq!(driver.image().unwrap(), Some(&b"saved program"[..]));
}

// =============================================================================
// Capacity Tests
// =============================================================================

#[test]
fn test_exact_capacity_succeeds() {
    let mut driver = setup_driver();
    let payload = vec![0x5Au8; driver.capacity()];

    write_image(&mut driver, &payload);

    assert_eq!(driver.data_size(), 1024);
    driver.verify().unwrap();
}

#[test]
fn test_exact_capacity_with_word_writes() {
    for write_size in [2, 4] {
        let mut driver = RegionDriver::new(RamFlash::new(1000, 1000, write_size)).unwrap();
        let payload = vec![0x41u8; driver.capacity()];

        driver.begin_program().unwrap();
        driver.program(&payload[..3]).unwrap();
        driver.program(&payload[3..]).unwrap();
        driver.end_program().unwrap();

        assert_eq!(driver.data_size(), 992);
        assert_eq!(driver.data(), &payload[..]);
        driver.verify().unwrap();
    }
}

#[test]
fn test_capacity_plus_one_fails_full() {
    let mut driver = setup_driver();
    let payload = vec![0x5Au8; driver.capacity() + 1];

    driver.begin_program().unwrap();
    let result = driver.program(&payload);

    assert!(matches!(result, Err(StoreError::Full { .. })));
    assert_eq!(Status::of(&result), Status::Full);
    assert_eq!(driver.cursor(), Some(0));
}

#[test]
fn test_overflow_in_later_chunk_keeps_session_open() {
    let mut driver = setup_driver();

    driver.begin_program().unwrap();
    driver.program(&[1u8; 1000]).unwrap();
    assert!(driver.program(&[1u8; 25]).is_err());
    driver.program(&[1u8; 24]).unwrap();
    driver.end_program().unwrap();

    assert_eq!(driver.data_size(), 1024);
}

// =============================================================================
// Session Ordering Tests
// =============================================================================

#[test]
fn test_program_without_begin_rejected() {
    let mut driver = setup_driver();

    let result = driver.program(b"data");

    assert!(matches!(result, Err(StoreError::Session(_))));
    assert_eq!(Status::of(&result), Status::Error);
    assert_eq!(driver.device().program_count(), 0);
    assert!(driver.is_erased());
}

#[test]
fn test_program_after_end_rejected() {
    let mut driver = setup_driver();
    write_image(&mut driver, b"done");
    let programs = driver.device().program_count();

    let result = driver.program(b"late");

    assert!(matches!(result, Err(StoreError::Session(_))));
    assert_eq!(driver.device().program_count(), programs);
    assert_eq!(driver.data(), b"done");
}

#[test]
fn test_end_without_begin_rejected() {
    let mut driver = setup_driver();

    assert!(matches!(
        driver.end_program(),
        Err(StoreError::Session(_))
    ));
    assert!(driver.is_erased());
}

#[test]
fn test_begin_during_session_rejected() {
    let mut driver = setup_driver();
    driver.begin_program().unwrap();
    driver.program(b"abc").unwrap();

    assert!(matches!(
        driver.begin_program(),
        Err(StoreError::Session(_))
    ));
    assert_eq!(driver.cursor(), Some(3));
}

#[test]
fn test_clear_during_session_rejected() {
    let mut driver = setup_driver();
    driver.begin_program().unwrap();

    assert!(matches!(driver.clear(), Err(StoreError::Session(_))));
}

// =============================================================================
// Clear Tests
// =============================================================================

#[test]
fn test_clear_returns_region_to_erased() {
    let mut driver = setup_driver();
    write_image(&mut driver, b"something");

    driver.clear().unwrap();

    assert!(driver.is_erased());
    assert_eq!(driver.data_size(), 0);
    assert!(driver.image().unwrap().is_none());
}

#[test]
fn test_clear_is_idempotent() {
    let mut driver = setup_driver();

    driver.clear().unwrap();
    driver.clear().unwrap();

    assert!(driver.is_erased());
    assert_eq!(driver.data_size(), 0);
}

#[test]
fn test_clear_is_bracketed_by_barriers() {
    let mut driver = setup_driver();

    driver.clear().unwrap();

    assert_eq!(
        driver.device().barriers(),
        &[Barrier::Invalidate, Barrier::Restore]
    );
}

#[test]
fn test_session_barriers_balanced() {
    let mut driver = setup_driver();

    write_image(&mut driver, b"payload");

    let barriers = driver.device().barriers();
    assert_eq!(barriers.len(), 6);
    for pair in barriers.chunks(2) {
        assert_eq!(pair, &[Barrier::Invalidate, Barrier::Restore]);
    }
}

// =============================================================================
// Hardware Fault Tests
// =============================================================================

#[test]
fn test_program_fault_abandons_session() {
    let mut driver = RegionDriver::new({
        let mut flash = RamFlash::new(512, 64, 1);
        flash.fail_after_programs(0);
        flash
    })
    .unwrap();

    driver.begin_program().unwrap();
    let result = driver.program(b"doomed");

    assert!(matches!(result, Err(StoreError::HardwareFatal(_))));
    assert_eq!(Status::of(&result), Status::Fatal);
    assert_eq!(driver.state(), SessionState::Idle);
    assert!(matches!(
        driver.program(b"more"),
        Err(StoreError::Session(_))
    ));
    assert!(driver.is_erased());
}

#[test]
fn test_erase_fault_abandons_session() {
    let mut flash = RamFlash::new(512, 64, 1);
    flash.set_fail_erase(true);
    let mut driver = RegionDriver::new(flash).unwrap();

    let result = driver.begin_program();

    assert!(matches!(result, Err(StoreError::HardwareFatal(_))));
    assert_eq!(driver.state(), SessionState::Idle);
}

#[test]
fn test_torn_finalize_detected_by_verify() {
    let mut flash = RamFlash::new(512, 64, 1);
    // Payload and size word land, checksum word is rejected
    flash.fail_after_programs(2);
    let mut driver = RegionDriver::new(flash).unwrap();

    driver.begin_program().unwrap();
    driver.program(b"hello").unwrap();
    let result = driver.end_program();

    assert!(matches!(result, Err(StoreError::HardwareFatal(_))));
    assert_eq!(driver.state(), SessionState::Idle);
    assert_eq!(driver.data_size(), 5);
    assert!(matches!(driver.verify(), Err(StoreError::Integrity(_))));
    assert!(driver.image().is_err());
}

#[test]
fn test_retry_after_fault_succeeds() {
    let mut flash = RamFlash::new(512, 64, 1);
    flash.fail_after_programs(0);
    let mut driver = RegionDriver::new(flash).unwrap();
    driver.begin_program().unwrap();
    assert!(driver.program(b"x").is_err());

    let mut flash = driver.into_device();
    flash.heal();
    let mut driver = RegionDriver::new(flash).unwrap();
    write_image(&mut driver, b"second try");

    assert_eq!(driver.data(), b"second try");
}

// =============================================================================
// Corruption Tests
// =============================================================================

#[test]
fn test_corrupted_payload_detected() {
    let mut driver = setup_driver();
    write_image(&mut driver, b"pristine payload");

    let mut flash = driver.into_device();
    flash.poke(HEADER_SIZE + 3, b'X');
    let driver = RegionDriver::new(flash).unwrap();

    assert!(matches!(driver.verify(), Err(StoreError::Integrity(_))));
    assert!(!checksum::verify(driver.data(), driver.checksum()));
}

#[test]
fn test_out_of_range_size_word_reads_empty() {
    let mut flash = RamFlash::new(512, 64, 1);
    for (i, b) in 4096u32.to_ne_bytes().iter().enumerate() {
        flash.poke(i, *b);
    }
    let driver = RegionDriver::new(flash).unwrap();

    assert!(!driver.is_erased());
    assert_eq!(driver.data_size(), 0);
    assert!(matches!(driver.verify(), Err(StoreError::Integrity(_))));
}
