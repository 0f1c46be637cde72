//! Workspace-wide integration tests: whole sweeps against the sim device.

mod sweep_e2e;
