//! A pure Rust library for distilling reactive molecular dynamics
//! trajectories into training datasets for machine-learning potentials.
//! It streams LAMMPS trajectory output, classifies every atom's local
//! chemical environment, samples a bounded number of representatives per
//! environment class, and extracts periodic-boundary-aware descriptors and
//! clusters ready for quantum-chemistry labeling.
//!
//! # Features
//!
//! - **Format adapters** — Streaming readers for ReaxFF bond-list files and
//!   `ITEM:`-tagged coordinate dumps, including triclinic boxes and
//!   multi-file trajectories
//! - **Fingerprint classification** — Canonical element + sorted-bond-order
//!   keys grouping chemically equivalent atoms across the whole trajectory
//! - **Representative sampling** — Per-class quotas with temporal spread,
//!   so rare environments survive and abundant ones do not dominate
//! - **Environment descriptors** — Minimum-image neighbor search with
//!   sorted `Z/d` descriptors and unbroken extracted clusters
//!
//! # Quick Start
//!
//! The pipeline runs in two passes over a [`TrajectoryReader`]: a scan that
//! builds the fingerprint table, then a sampling step that picks the atoms
//! worth labeling:
//!
//! ```
//! use std::io::Cursor;
//!
//! use traj_forge::dataset::{
//!     scan_trajectory, select, BuildConfig, CovalentRadiusPerceiver, Error,
//! };
//! use traj_forge::io::bond::BondReader;
//! use traj_forge::model::Element;
//!
//! // Two methane-like steps from `fix reaxff/bonds` output; in step two one
//! // C-H bond has dissociated.
//! let bonds = "\
//! ## Timestep 0
//! ##
//! ## Number of particles 5
//! ## Max number of bonds per atom 4
//! ## id type nb id_1..id_nb mol bo_1..bo_nb
//!  1 1 4 2 3 4 5 1 0.94 0.97 1.02 0.99
//!  2 2 1 1 1 0.94
//!  3 2 1 1 1 0.97
//!  4 2 1 1 1 1.02
//!  5 2 1 1 1 0.99
//! ##
//! ## Timestep 10
//! ##
//! ## Number of particles 5
//! ## Max number of bonds per atom 4
//! ## id type nb id_1..id_nb mol bo_1..bo_nb
//!  1 1 3 2 3 4 1 0.91 0.95 1.05
//!  2 2 1 1 1 0.91
//!  3 2 1 1 1 0.95
//!  4 2 1 1 1 1.05
//!  5 2 0 1
//! ##
//! ";
//!
//! let mut reader = BondReader::new(
//!     Cursor::new(bonds.as_bytes().to_vec()),
//!     &[Element::C, Element::H],
//! )?;
//!
//! let config = BuildConfig {
//!     atom_names: vec!["C".into(), "H".into()],
//!     ..BuildConfig::default()
//! };
//! let outcome = scan_trajectory(
//!     &mut reader,
//!     &config,
//!     &CovalentRadiusPerceiver::default(),
//!     None,
//!     |_| {},
//! )?;
//!
//! // Four distinct environments: CH4 carbon, CH3 carbon, bonded H, free H.
//! assert_eq!(outcome.table.len(), 4);
//! assert_eq!(outcome.steps, 2);
//!
//! let (selections, report) = select(&outcome.table, config.quota, config.policy);
//! // Every class is under the quota of 10, so everything is kept.
//! assert_eq!(report.total_selected(), 10);
//! assert_eq!(selections.len(), 10);
//! # Ok::<(), Error>(())
//! ```
//!
//! # Module Organization
//!
//! - [`io`] — Format adapters producing a uniform stream of [`model::Step`]s
//! - [`dataset`] — Classification, sampling, descriptors, and the assembly
//!   seams toward QM labeling and dataset serialization
//! - [`model`] — Elements, fingerprints, steps, and periodic cells

pub mod dataset;
pub mod io;
pub mod model;

pub use model::{BondRow, Cell, Element, Fingerprint, ParseElementError, Step, Structure};

pub use io::{open_trajectory, Format, TrajectoryReader};

pub use dataset::{
    describe_selections, scan_trajectory, select, step_molecules, BondPerceiver, BuildConfig,
    CovalentRadiusPerceiver, DescriptorRecord, SamplePolicy, Selection,
};
