pub mod flood_select;
pub mod mask_export;
