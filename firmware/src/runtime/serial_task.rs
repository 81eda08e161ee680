use embassy_futures::join::join;
use embassy_stm32 as hal;
use embassy_stm32::Peri;
use embassy_stm32::usart::{BufferedUart, Config as UartConfig, DataBits, Parity, StopBits};
use embassy_time::{Duration, Timer};
use embedded_io_async::{Read, Write};

use crate::serial::{SERIAL_QUEUE_DEPTH, SerialQueues, forward_received};

const COMPANION_UART_BAUD: u32 = 9_600;
const UART_BUFFER_SIZE: usize = SERIAL_QUEUE_DEPTH;

static mut UART_TX_BUFFER: [u8; UART_BUFFER_SIZE] = [0; UART_BUFFER_SIZE];
static mut UART_RX_BUFFER: [u8; UART_BUFFER_SIZE] = [0; UART_BUFFER_SIZE];

embassy_stm32::bind_interrupts!(struct UartIrqs {
    USART3_4_5_6_LPUART1 => embassy_stm32::usart::BufferedInterruptHandler<hal::peripherals::USART5>;
});

/// Moves bytes between USART5 and the control loop's queues.
#[embassy_executor::task]
pub async fn run(
    queues: &'static SerialQueues,
    usart: Peri<'static, hal::peripherals::USART5>,
    tx_pin: Peri<'static, hal::peripherals::PB0>,
    rx_pin: Peri<'static, hal::peripherals::PB1>,
) -> ! {
    let mut config = UartConfig::default();
    config.baudrate = COMPANION_UART_BAUD;
    config.data_bits = DataBits::DataBits8;
    config.stop_bits = StopBits::STOP1;
    config.parity = Parity::ParityNone;

    let uart = match unsafe {
        BufferedUart::new(
            usart,
            rx_pin,
            tx_pin,
            &mut UART_TX_BUFFER,
            &mut UART_RX_BUFFER,
            UartIrqs,
            config,
        )
    } {
        Ok(uart) => uart,
        Err(_) => {
            defmt::error!("serial: UART configuration rejected");
            loop {
                core::future::pending::<()>().await;
            }
        }
    };

    let (mut uart_tx, mut uart_rx) = uart.split();
    let outgoing = queues.tx_receiver();
    let incoming = queues.rx_sender();

    let controller_to_uart = async move {
        loop {
            let byte = outgoing.receive().await;
            if uart_tx.write_all(&[byte]).await.is_err() {
                defmt::warn!("serial: UART write error");
                Timer::after(Duration::from_millis(5)).await;
            }
        }
    };

    let uart_to_controller = async move {
        let mut ingress = [0u8; UART_BUFFER_SIZE];
        loop {
            match uart_rx.read(&mut ingress).await {
                Ok(count) if count > 0 => {
                    let accepted = forward_received(&incoming, &ingress[..count]);
                    if accepted < count {
                        defmt::warn!("serial: dropped {} bytes (rx queue full)", count - accepted);
                    }
                }
                Ok(_) => {}
                Err(_) => {
                    defmt::warn!("serial: UART read error");
                    Timer::after(Duration::from_millis(5)).await;
                }
            }
        }
    };

    join(controller_to_uart, uart_to_controller).await;
    loop {
        core::future::pending::<()>().await;
    }
}
