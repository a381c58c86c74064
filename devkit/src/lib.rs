/*!
# Autonomic DevKit - doubles and harness for the control loop

Helps test hosts and custom actions without real collectors or a running timer:
- Scripted metrics source (breach sequences, sample failures)
- Recording, failing, slow and panicking remediation actions
- Recording report sink
- `TestHarness` driving ticks one by one
*/

pub mod action_stubs;
pub mod source_stub;
pub mod test_utils;

pub use action_stubs::{FailingAction, PanickingAction, RecordingAction, RecordingSink, SlowAction};
pub use source_stub::ScriptedMetricsSource;
pub use test_utils::TestHarness;
