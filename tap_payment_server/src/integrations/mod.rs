pub mod mercado;

pub use mercado::MercadoProvider;
