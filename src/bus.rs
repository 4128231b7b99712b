use embedded_hal::i2c as hal_i2c;
use embedded_hal::spi as hal_spi;

/// Blanket trait for types implementing [`embedded_hal::i2c::I2c`]
pub trait I2cBus: hal_i2c::I2c {
    type BusError: From<Self::Error>;
}

impl<T, E> I2cBus for T
where
    T: hal_i2c::I2c<Error = E>,
{
    type BusError = E;
}

/// Blanket trait for types implementing [`embedded_hal::spi::SpiBus`]
pub trait SpiBus: hal_spi::SpiBus {
    type BusError: From<Self::Error>;
}

impl<T, E> SpiBus for T
where
    T: hal_spi::SpiBus<Error = E>,
{
    type BusError = E;
}
