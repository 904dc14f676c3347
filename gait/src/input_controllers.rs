pub mod telemetry_input_controller;
