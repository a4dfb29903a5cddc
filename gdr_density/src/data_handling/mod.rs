pub mod gdr_matrix;
pub mod population;
pub mod reshape;
