// Domain layer: library entities, report types and ports (Storage, ConfigProvider, Pipeline).

pub mod model;
pub mod ports;
